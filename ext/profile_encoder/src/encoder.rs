use std::collections::HashMap;

use crate::artifact::{Frame, FrameIndex};
use crate::module_path::normalize_module_path;
use crate::sampler::{RawProfile, SourceType, StackNode};
use crate::stack_identity::{StackIdentityTable, StackIndex};

/// A sample reduced to its stack reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedSample {
    pub stack_index: StackIndex,
    pub elapsed_ns: u64,
}

/// Builds the deduplicated frame and stack tables of one session.
///
/// Both tables are append-only and indices are handed out densely in
/// first-seen order. Frames are keyed by the sampler's node id, not by their
/// contents.
#[derive(Debug)]
pub struct ProfileEncoder {
    max_stack_depth: usize,
    frames: Vec<Frame>,
    stacks: Vec<Vec<FrameIndex>>,
    frame_lookup: HashMap<u32, FrameIndex>,
    stack_lookup: StackIdentityTable,
    // resource path -> module name
    module_cache: HashMap<String, String>,
    resources: Vec<String>,
}

impl ProfileEncoder {
    pub fn new(max_stack_depth: usize) -> Self {
        Self {
            max_stack_depth,
            frames: vec![],
            stacks: vec![],
            frame_lookup: HashMap::new(),
            stack_lookup: StackIdentityTable::new(),
            module_cache: HashMap::new(),
            resources: vec![],
        }
    }

    /// Runs every sample of `profile` through `process_sample`.
    pub fn encode<P: RawProfile>(&mut self, profile: &P) -> Vec<EncodedSample> {
        let start_time_us = profile.start_time_us();
        let mut samples = Vec::with_capacity(profile.samples_count());

        for i in 0..profile.samples_count() {
            let Some(leaf) = profile.sample(i) else {
                log::debug!("Sample {} has no stack node, skipping", i);
                continue;
            };
            let (stack_index, _) = self.process_sample(profile, leaf);
            let elapsed_us = profile.sample_timestamp_us(i).saturating_sub(start_time_us);
            samples.push(EncodedSample {
                stack_index,
                elapsed_ns: u64::try_from(elapsed_us).unwrap_or(0).saturating_mul(1000),
            });
        }

        log::debug!(
            "Encoded {} samples into {} stacks and {} frames",
            samples.len(),
            self.stacks.len(),
            self.frames.len()
        );
        samples
    }

    /// Returns the stack index for the sample whose leaf is `leaf`, and
    /// whether that stack was seen for the first time.
    pub fn process_sample<P: RawProfile>(&mut self, profile: &P, leaf: &P::Node) -> (StackIndex, bool) {
        let candidate = self.stacks.len();

        // A leaf hit only once cannot have been seen before.
        let stack_index = if leaf.hit_count() > 1 {
            self.stack_lookup
                .resolve(profile.walk(leaf).map(|node| node.node_id()), candidate)
        } else {
            candidate
        };
        if stack_index != candidate {
            return (stack_index, false);
        }

        let mut stack = Vec::new();
        for node in profile.walk(leaf).take(self.max_stack_depth) {
            stack.push(self.frame_index_for(node));
        }
        log::trace!("New stack {} ({} frames)", stack_index, stack.len());
        self.stacks.push(stack);
        (stack_index, true)
    }

    fn frame_index_for<N: StackNode>(&mut self, node: &N) -> FrameIndex {
        if let Some(index) = self.frame_lookup.get(&node.node_id()) {
            return *index;
        }
        let index = self.frames.len();
        let frame = self.build_frame(node);
        self.frames.push(frame);
        self.frame_lookup.insert(node.node_id(), index);
        index
    }

    fn build_frame<N: StackNode>(&mut self, node: &N) -> Frame {
        let resource = node.resource_name();
        let module = if resource.is_empty() {
            None
        } else {
            Some(self.module_for(resource))
        };
        Frame {
            function: node.function_name().to_owned(),
            abs_path: resource.to_owned(),
            filename: resource.to_owned(),
            lineno: node.line_number(),
            colno: node.column_number(),
            in_app: node.source_type() == SourceType::Script,
            module,
        }
    }

    fn module_for(&mut self, resource: &str) -> String {
        if let Some(module) = self.module_cache.get(resource) {
            return module.clone();
        }
        let module = normalize_module_path(resource);
        self.module_cache.insert(resource.to_owned(), module.clone());
        self.resources.push(resource.to_owned());
        module
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn stacks(&self) -> &[Vec<FrameIndex>] {
        &self.stacks
    }

    /// Distinct non-empty resource paths in first-seen order.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn into_tables(self) -> (Vec<Vec<FrameIndex>>, Vec<Frame>, Vec<String>) {
        (self.stacks, self.frames, self.resources)
    }
}
