//! # Services
//!
//! One service per entity over a shared store. Every method runs in its
//! own transaction: it begins, delegates to the engine, commits on success
//! and rolls back on failure. Engine errors pass through unchanged.

use crate::query::Page;
use crate::storage::{Store, Transaction, in_tx};
use crate::{
    Edge, EdgeFilter, EdgeUpdate, Graph, GraphFilter, GraphUpdate, Node, NodeFilter, NodeUpdate,
    StoreError,
};
use std::sync::Arc;

/// Run one engine call as its own transaction, logging failures.
fn call<'s, S, T, F>(store: &'s S, op: &'static str, f: F) -> Result<T, StoreError>
where
    S: Store,
    F: FnOnce(&mut S::Tx<'s>) -> Result<T, StoreError>,
{
    in_tx(store, f).inspect_err(|e| {
        tracing::debug!(op, code = %e.code(), error = %e, "store call failed");
    })
}

macro_rules! service {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<S> {
            store: Arc<S>,
        }

        impl<S> Clone for $name<S> {
            fn clone(&self) -> Self {
                Self {
                    store: Arc::clone(&self.store),
                }
            }
        }

        impl<S: Store> $name<S> {
            pub fn new(store: Arc<S>) -> Self {
                Self { store }
            }
        }
    };
}

service!(
    /// Graph CRUD.
    GraphService
);
service!(
    /// Node CRUD within one graph.
    NodeService
);
service!(
    /// Edge CRUD within one graph.
    EdgeService
);

impl<S: Store> GraphService<S> {
    /// Create `graph`, filling in its generated fields.
    pub fn create_graph(&self, graph: &mut Graph) -> Result<(), StoreError> {
        call(&*self.store, "create_graph", |tx| tx.create_graph(graph))
    }

    pub fn find_graph_by_uid(&self, uid: &str) -> Result<Graph, StoreError> {
        call(&*self.store, "find_graph_by_uid", |tx| tx.find_graph_by_uid(uid))
    }

    pub fn find_graphs(&self, filter: &GraphFilter) -> Result<Page<Graph>, StoreError> {
        call(&*self.store, "find_graphs", |tx| tx.find_graphs(filter))
    }

    pub fn update_graph(&self, uid: &str, update: &GraphUpdate) -> Result<Graph, StoreError> {
        call(&*self.store, "update_graph", |tx| tx.update_graph(uid, update))
    }

    pub fn delete_graph(&self, uid: &str) -> Result<(), StoreError> {
        call(&*self.store, "delete_graph", |tx| tx.delete_graph(uid))
    }
}

impl<S: Store> NodeService<S> {
    pub fn create_node(&self, graph_uid: &str, node: &mut Node) -> Result<(), StoreError> {
        call(&*self.store, "create_node", |tx| tx.create_node(graph_uid, node))
    }

    pub fn find_node_by_id(&self, graph_uid: &str, id: i64) -> Result<Node, StoreError> {
        call(&*self.store, "find_node_by_id", |tx| tx.find_node_by_id(graph_uid, id))
    }

    pub fn find_node_by_uid(&self, graph_uid: &str, uid: &str) -> Result<Node, StoreError> {
        call(&*self.store, "find_node_by_uid", |tx| tx.find_node_by_uid(graph_uid, uid))
    }

    pub fn find_nodes(
        &self,
        graph_uid: &str,
        filter: &NodeFilter,
    ) -> Result<Page<Node>, StoreError> {
        call(&*self.store, "find_nodes", |tx| tx.find_nodes(graph_uid, filter))
    }

    pub fn update_node(
        &self,
        graph_uid: &str,
        id: i64,
        update: &NodeUpdate,
    ) -> Result<Node, StoreError> {
        call(&*self.store, "update_node", |tx| tx.update_node(graph_uid, id, update))
    }

    /// Delete a node and every edge touching it.
    pub fn delete_node_by_id(&self, graph_uid: &str, id: i64) -> Result<(), StoreError> {
        call(&*self.store, "delete_node_by_id", |tx| tx.delete_node_by_id(graph_uid, id))
    }

    pub fn delete_node_by_uid(&self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        call(&*self.store, "delete_node_by_uid", |tx| tx.delete_node_by_uid(graph_uid, uid))
    }
}

impl<S: Store> EdgeService<S> {
    /// Create `edge`. An existing (source, target) pair is a no-op that
    /// fills `edge` from the stored edge.
    pub fn create_edge(&self, graph_uid: &str, edge: &mut Edge) -> Result<(), StoreError> {
        call(&*self.store, "create_edge", |tx| tx.create_edge(graph_uid, edge))
    }

    pub fn find_edge_by_uid(&self, graph_uid: &str, uid: &str) -> Result<Edge, StoreError> {
        call(&*self.store, "find_edge_by_uid", |tx| tx.find_edge_by_uid(graph_uid, uid))
    }

    pub fn find_edges(
        &self,
        graph_uid: &str,
        filter: &EdgeFilter,
    ) -> Result<Page<Edge>, StoreError> {
        call(&*self.store, "find_edges", |tx| tx.find_edges(graph_uid, filter))
    }

    pub fn update_edge_between(
        &self,
        graph_uid: &str,
        source: &str,
        target: &str,
        update: &EdgeUpdate,
    ) -> Result<Edge, StoreError> {
        call(&*self.store, "update_edge_between", |tx| {
            tx.update_edge_between(graph_uid, source, target, update)
        })
    }

    pub fn delete_edge(&self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        call(&*self.store, "delete_edge", |tx| tx.delete_edge(graph_uid, uid))
    }

    pub fn delete_edge_between(
        &self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<(), StoreError> {
        call(&*self.store, "delete_edge_between", |tx| {
            tx.delete_edge_between(graph_uid, source, target)
        })
    }
}

/// The three services over one store.
#[derive(Debug)]
pub struct Services<S> {
    pub graphs: GraphService<S>,
    pub nodes: NodeService<S>,
    pub edges: EdgeService<S>,
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            graphs: self.graphs.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            graphs: GraphService::new(Arc::clone(&store)),
            nodes: NodeService::new(Arc::clone(&store)),
            edges: EdgeService::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use crate::storage::Backend;

    fn services(dsn: &str) -> Services<Backend> {
        Services::new(Arc::new(Backend::open(dsn).expect("open")))
    }

    #[test]
    fn services_share_one_store() {
        for dsn in [":memory:", "sqlite://:memory:"] {
            let s = services(dsn);
            let mut g = Graph::new();
            s.graphs.create_graph(&mut g).expect("graph");
            let mut n = Node::new().with_uid("n1");
            s.nodes.create_node(&g.uid, &mut n).expect("node");

            let cloned = s.clone();
            let page = cloned
                .nodes
                .find_nodes(&g.uid, &NodeFilter::default())
                .expect("find");
            assert_eq!(page.total, 1, "{dsn}");
        }
    }

    #[test]
    fn failed_call_rolls_back_and_keeps_code() {
        let s = services("sqlite://:memory:");
        let mut g = Graph::new().with_uid("g");
        s.graphs.create_graph(&mut g).expect("graph");
        let err = s
            .graphs
            .create_graph(&mut Graph::new().with_uid("g"))
            .expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::Conflict);

        // The store is still usable after the rollback.
        assert_eq!(s.graphs.find_graph_by_uid("g").expect("find").uid, "g");
    }
}
