use std::borrow::Borrow;
use std::collections::VecDeque;

pub(crate) type HashMap<K,V> = std::collections::hash_map::HashMap<K,V,nohash::BuildNoHashHasher<usize>>;

// (neighbour, edge label)
pub type Adjacent = (usize,usize);

/// Undirected graph over `usize` nodes where every edge carries a label,
/// usually the index of the physical link it stands for.
///
/// Neighbour lists are kept sorted by neighbour index so that every
/// traversal visits nodes in the same order on every run.
#[derive(Clone,Debug)]
pub struct UnDirectedGraph {
    edges_len:usize,
    adjacency_list:HashMap<usize,Vec<Adjacent>>
}

impl Default for UnDirectedGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl UnDirectedGraph {
    pub fn new() -> Self {
        Self {
            edges_len:0,
            adjacency_list:HashMap::with_hasher(
                nohash::BuildNoHashHasher::default()
            )
        }
    }
    pub fn with_capacity(capacity:usize) -> Self {
        if capacity == 0 {
            return Self::new();
        }
        Self {
            edges_len:0,
            adjacency_list:HashMap::with_capacity_and_hasher(
                capacity,
                nohash::BuildNoHashHasher::default())
        }
    }
    pub fn edges_len(&self) -> usize {
        self.edges_len
    }
    pub fn nodes_len(&self) -> usize {
        self.adjacency_list.len()
    }
    pub fn is_empty(&self) -> bool {
        if self.nodes_len() == 0 {
            debug_assert!(self.edges_len() == 0);
            return true;
        }
        false
    }
    pub fn contains_node(&self,node:usize) -> bool {
        self.adjacency_list.contains_key(&node)
    }
    // only push node, not adding edges
    pub fn push_node<B:Borrow<usize>>(&mut self,node:B) {
        let node = node.borrow();
        if self.adjacency_list.contains_key(node) {
            return;
        }
        self.adjacency_list.insert(*node,Vec::new());
    }
    /// Inserts the edge `node1 - node2` labelled `label`.
    ///
    /// Returns `false` and leaves the graph untouched for self loops and for
    /// pairs that are already joined.
    pub fn push_edge(&mut self,node1:usize,node2:usize,label:usize) -> bool {
        if node1 == node2 || self.edge_between(node1, node2).is_some() {
            return false;
        }
        Self::insert_sorted(self.adjacency_list.entry(node1).or_default(), (node2,label));
        Self::insert_sorted(self.adjacency_list.entry(node2).or_default(), (node1,label));
        self.edges_len += 1;
        true
    }
    fn insert_sorted(list:&mut Vec<Adjacent>,adjacent:Adjacent) {
        let pos = list.partition_point(|(n,_)| *n < adjacent.0);
        list.insert(pos, adjacent);
    }
    /// Neighbours of `node` in ascending node order, empty for unknown nodes.
    pub fn neighbours(&self,node:usize) -> &[Adjacent] {
        self.adjacency_list.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn edge_between(&self,node1:usize,node2:usize) -> Option<usize> {
        let list = self.adjacency_list.get(&node1)?;
        let pos = list.binary_search_by_key(&node2, |(n,_)| *n).ok()?;
        Some(list[pos].1)
    }
    /// Breadth first hop counts from `start`, only crossing edges whose label
    /// passes `passable`. Unreached nodes are absent from the result.
    pub fn bfs_hops<F>(&self,start:usize,passable:F) -> HashMap<usize,usize>
        where F:Fn(usize) -> bool
    {
        let mut hops = HashMap::with_capacity_and_hasher(
            self.nodes_len(), nohash::BuildNoHashHasher::default()
        );
        if !self.contains_node(start) {
            return hops;
        }
        let mut queue = VecDeque::with_capacity(self.nodes_len());
        hops.insert(start,0);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            let depth = hops[&current];
            for &(next,label) in self.neighbours(current) {
                if hops.contains_key(&next) || !passable(label) {
                    continue;
                }
                hops.insert(next,depth + 1);
                queue.push_back(next);
            }
        }
        hops
    }
    pub fn shrink_to_fit(&mut self) {
        self.adjacency_list.shrink_to_fit();
        for v in self.adjacency_list.values_mut() {
            v.shrink_to_fit();
        }
    }
}

impl<B:Borrow<(usize,usize,usize)>> FromIterator<B> for UnDirectedGraph {
    fn from_iter<T: IntoIterator<Item = B>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let size_estimation = match iter.size_hint() {
            (_,Some(n)) => {n},
            (n,None) => {n}
        };
        let mut new_graph = Self::with_capacity(size_estimation);
        for b in iter {
            let (node1,node2,label) = b.borrow();
            new_graph.push_edge(*node1, *node2, *label);
        }
        new_graph.shrink_to_fit();
        new_graph
    }
}

#[cfg(test)]
mod tests{
    use rand::Rng;

    use super::UnDirectedGraph;

    #[test]
    fn test_new_undirected_graph() {
        let mut rng = rand::rng();
        let edge_len:usize = rng.random_range(1000..10000);
        let mut edges:std::collections::HashSet<(usize,usize)> = std::collections::HashSet::new();
        let mut labelled = vec![];
        for label in 0..edge_len {
            let a = rng.random_range(0..5000);
            let b = rng.random_range(0..5000);
            if a == b {continue}
            if edges.insert((a.min(b),a.max(b))) {
                labelled.push((a,b,label));
            }
        }
        let isolated_nodes_len:usize = rng.random_range(100..1000);

        let mut new_graph:UnDirectedGraph = labelled.iter().collect();
        for n in 0..isolated_nodes_len {new_graph.push_node(5000 + n)};

        assert_eq!(new_graph.edges_len(),edges.len());
        for (a,b,label) in labelled {
            assert_eq!(new_graph.edge_between(a, b),Some(label));
            assert_eq!(new_graph.edge_between(b, a),Some(label));
        }
    }
    #[test]
    fn test_rejects_loops_and_duplicates() {
        let mut graph = UnDirectedGraph::new();
        assert!(graph.push_edge(1, 2, 0));
        assert!(!graph.push_edge(2, 1, 1));
        assert!(!graph.push_edge(3, 3, 2));
        assert_eq!(graph.edges_len(),1);
        assert_eq!(graph.edge_between(1, 2),Some(0));
    }
    #[test]
    fn test_neighbours_sorted() {
        let graph:UnDirectedGraph = [(5,9,0),(5,1,1),(5,7,2),(5,3,3)].into_iter().collect();
        let order:Vec<usize> = graph.neighbours(5).iter().map(|(n,_)| *n).collect();
        assert_eq!(order,vec![1,3,7,9]);
        assert!(graph.neighbours(42).is_empty());
    }
    #[test]
    fn test_bfs_hops_respects_passable() {
        // 0 - 1 - 2 - 3, and a shortcut 0 - 3 labelled 9
        let graph:UnDirectedGraph = [(0,1,0),(1,2,1),(2,3,2),(0,3,9)].into_iter().collect();
        let all = graph.bfs_hops(0, |_| true);
        assert_eq!(all[&3],1);
        assert_eq!(all[&2],2);
        let blocked = graph.bfs_hops(0, |label| label != 9);
        assert_eq!(blocked[&3],3);
        let cut = graph.bfs_hops(0, |label| label != 9 && label != 1);
        assert!(!cut.contains_key(&2));
        assert!(graph.bfs_hops(77, |_| true).is_empty());
    }
}
