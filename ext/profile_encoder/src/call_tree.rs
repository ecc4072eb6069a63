use std::collections::HashMap;
use std::time::Instant;

use crate::configuration::SamplingOptions;
use crate::sampler::{RawProfile, Sampler, SourceType, StackNode};

/// Call-site metadata for one frame of a captured stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameInfo {
    pub function_name: String,
    pub resource_name: String,
    pub line_number: i32,
    pub column_number: i32,
    pub source_type: SourceType,
}

impl FrameInfo {
    pub fn script(function_name: &str, resource_name: &str, line_number: i32, column_number: i32) -> Self {
        Self {
            function_name: function_name.to_owned(),
            resource_name: resource_name.to_owned(),
            line_number,
            column_number,
            source_type: SourceType::Script,
        }
    }

    pub fn native(function_name: &str) -> Self {
        Self {
            function_name: function_name.to_owned(),
            resource_name: String::new(),
            line_number: 0,
            column_number: 0,
            source_type: SourceType::Native,
        }
    }
}

#[derive(Debug)]
pub struct CallTreeNode {
    id: u32,
    parent: Option<usize>,
    frame: FrameInfo,
    hit_count: u32,
    children: HashMap<FrameInfo, usize>,
}

impl StackNode for CallTreeNode {
    fn node_id(&self) -> u32 {
        self.id
    }

    fn hit_count(&self) -> u32 {
        self.hit_count
    }

    fn function_name(&self) -> &str {
        &self.frame.function_name
    }

    fn resource_name(&self) -> &str {
        &self.frame.resource_name
    }

    fn line_number(&self) -> i32 {
        self.frame.line_number
    }

    fn column_number(&self) -> i32 {
        self.frame.column_number
    }

    fn source_type(&self) -> SourceType {
        self.frame.source_type
    }
}

/// An in-memory sampled call tree.
///
/// Every distinct root-to-node path gets its own node; node ids are assigned
/// in first-seen order starting at 1 and never change.
#[derive(Debug)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    roots: HashMap<FrameInfo, usize>,
    // (leaf node index, timestamp)
    samples: Vec<(usize, i64)>,
    start_time_us: i64,
    end_time_us: i64,
}

impl CallTree {
    pub fn new(start_time_us: i64) -> Self {
        Self {
            nodes: vec![],
            roots: HashMap::new(),
            samples: vec![],
            start_time_us,
            end_time_us: start_time_us,
        }
    }

    /// Records one sample. `frames` is ordered outermost first.
    /// Returns the id of the leaf node, or `None` for an empty stack.
    pub fn record(&mut self, frames: &[FrameInfo], timestamp_us: i64) -> Option<u32> {
        let mut current: Option<usize> = None;
        for frame in frames {
            current = Some(self.child_of(current, frame));
        }

        let leaf = current?;
        self.nodes[leaf].hit_count += 1;
        self.samples.push((leaf, timestamp_us));
        self.end_time_us = self.end_time_us.max(timestamp_us);
        Some(self.nodes[leaf].id)
    }

    pub fn finish(&mut self, end_time_us: i64) {
        self.end_time_us = self.end_time_us.max(end_time_us);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn child_of(&mut self, parent: Option<usize>, frame: &FrameInfo) -> usize {
        let existing = match parent {
            Some(parent) => self.nodes[parent].children.get(frame),
            None => self.roots.get(frame),
        };
        if let Some(index) = existing {
            return *index;
        }

        let index = self.nodes.len();
        self.nodes.push(CallTreeNode {
            id: index as u32 + 1,
            parent,
            frame: frame.clone(),
            hit_count: 0,
            children: HashMap::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent].children.insert(frame.clone(), index),
            None => self.roots.insert(frame.clone(), index),
        };
        index
    }
}

impl RawProfile for CallTree {
    type Node = CallTreeNode;

    fn start_time_us(&self) -> i64 {
        self.start_time_us
    }

    fn end_time_us(&self) -> i64 {
        self.end_time_us
    }

    fn samples_count(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Option<&CallTreeNode> {
        self.samples.get(index).map(|(node, _)| &self.nodes[*node])
    }

    fn sample_timestamp_us(&self, index: usize) -> i64 {
        self.samples
            .get(index)
            .map_or(self.start_time_us, |(_, timestamp)| *timestamp)
    }

    fn parent(&self, node: &CallTreeNode) -> Option<&CallTreeNode> {
        node.parent.map(|parent| &self.nodes[parent])
    }
}

/// A `Sampler` fed by the host: each captured stack is appended to every
/// profile currently running.
#[derive(Debug)]
pub struct RecordingSampler {
    epoch: Instant,
    active: HashMap<String, CallTree>,
    options: Option<SamplingOptions>,
}

impl Default for RecordingSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSampler {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            active: HashMap::new(),
            options: None,
        }
    }

    /// Microseconds since this sampler was created.
    pub fn now_us(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(i64::MAX)
    }

    pub fn record_sample(&mut self, frames: &[FrameInfo]) {
        let now = self.now_us();
        self.record_sample_at(frames, now);
    }

    pub fn record_sample_at(&mut self, frames: &[FrameInfo], timestamp_us: i64) {
        for tree in self.active.values_mut() {
            tree.record(frames, timestamp_us);
        }
    }

    pub fn is_profiling(&self, title: &str) -> bool {
        self.active.contains_key(title)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Options passed by the most recent `start_profiling`.
    pub fn options(&self) -> Option<&SamplingOptions> {
        self.options.as_ref()
    }
}

impl Sampler for RecordingSampler {
    type Profile = CallTree;

    fn start_profiling(&mut self, title: &str, options: &SamplingOptions) {
        self.options = Some(*options);
        if self.active.contains_key(title) {
            log::debug!("Profile {:?} is already running", title);
            return;
        }
        let now = self.now_us();
        self.active.insert(title.to_owned(), CallTree::new(now));
    }

    fn stop_profiling(&mut self, title: &str) -> Option<CallTree> {
        let mut tree = self.active.remove(title)?;
        tree.finish(self.now_us());
        Some(tree)
    }

    fn dispose(&mut self) {
        self.active.clear();
    }
}
