use crate::configuration::SamplingOptions;

/// The VM's stack sampler. Sessions drive it by title; whatever it collected
/// for a title is handed back once on stop.
pub trait Sampler {
    type Profile: RawProfile;

    fn start_profiling(&mut self, title: &str, options: &SamplingOptions);

    /// Returns `None` when the sampler has no running profile under `title`.
    fn stop_profiling(&mut self, title: &str) -> Option<Self::Profile>;

    fn dispose(&mut self) {}
}

/// What kind of code a stack node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceType {
    Script,
    Native,
    Callback,
    Internal,
    Unresolved,
}

/// One call-site entry of a sampled call tree.
pub trait StackNode {
    /// Stable for the lifetime of the profile it belongs to.
    fn node_id(&self) -> u32;
    /// Number of samples in which this node was the leaf.
    fn hit_count(&self) -> u32;
    fn function_name(&self) -> &str;
    /// Absolute script path, or empty for non-script code.
    fn resource_name(&self) -> &str;
    fn line_number(&self) -> i32;
    fn column_number(&self) -> i32;
    fn source_type(&self) -> SourceType;
}

/// The sampler's result for one title: a parent-linked call tree and the
/// leaf node of every sample taken.
pub trait RawProfile {
    type Node: StackNode;

    fn start_time_us(&self) -> i64;
    fn end_time_us(&self) -> i64;
    fn samples_count(&self) -> usize;
    fn sample(&self, index: usize) -> Option<&Self::Node>;
    fn sample_timestamp_us(&self, index: usize) -> i64;
    fn parent(&self, node: &Self::Node) -> Option<&Self::Node>;

    /// Walks from `leaf` towards the root.
    fn walk<'a>(&'a self, leaf: &'a Self::Node) -> StackWalk<'a, Self>
    where
        Self: Sized,
    {
        StackWalk {
            profile: self,
            next: Some(leaf),
        }
    }
}

/// Iterator over a node's parent chain, leaf first.
pub struct StackWalk<'a, P: RawProfile> {
    profile: &'a P,
    next: Option<&'a P::Node>,
}

impl<'a, P: RawProfile> Iterator for StackWalk<'a, P> {
    type Item = &'a P::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = self.profile.parent(node);
        Some(node)
    }
}
