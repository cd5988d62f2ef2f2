use std::collections::HashMap;
use std::hash::Hash;

/// Undirected graph kept as a union-find forest. Edges merge components as they are added, so
/// only connectivity is remembered.
#[derive(Debug)]
pub(crate) struct Graph<N> {
    nodes: Vec<N>,
    node_index: HashMap<N, usize>,
    parent: Vec<usize>,
}

impl<N> Graph<N>
where
    N: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            parent: Vec::new(),
        }
    }

    /// Index of `node`, inserting it as a singleton when it is new.
    pub(crate) fn add_node(&mut self, node: N) -> usize {
        if let Some(&i) = self.node_index.get(&node) {
            return i;
        }

        let i = self.nodes.len();
        self.nodes.push(node.clone());
        self.parent.push(i);
        self.node_index.insert(node, i);

        i
    }

    pub(crate) fn add_edge(&mut self, left: N, right: N) {
        let l = self.add_node(left);
        let r = self.add_node(right);

        let (root_l, root_r) = (self.find(l), self.find(r));
        if root_l != root_r {
            // the older node stays root, which keeps component order stable
            let (root, child) = if root_l < root_r { (root_l, root_r) } else { (root_r, root_l) };
            self.parent[child] = root;
        }
    }

    // path halving
    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Connected components, ordered by their first inserted node. Members keep insertion order.
    pub(crate) fn components(&mut self) -> Vec<Vec<N>> {
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<N>> = Vec::new();

        for i in 0..self.nodes.len() {
            let root = self.find(i);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(self.nodes[i].clone());
        }

        components
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
