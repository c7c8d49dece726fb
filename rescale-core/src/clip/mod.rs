//! # Clip Graph
//!
//! A [`Clip`] is a handle to one node of a lazy, pull-based filter graph.
//! Nodes record the function that produced them, their inputs and arguments,
//! and the resulting video properties. Nothing here touches pixels: the graph
//! is handed to an execution engine which evaluates frames on demand.
//!
//! ```text
//!   source ─► std.Crop ─► descale.Debicubic ─► resize.Bicubic ─► std.MaskedMerge
//!                               │                                     ▲
//!                               └──► model.Double ─► resize.Bicubic ──┘
//! ```

pub mod format;
pub mod ops;

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
pub use format::{ColorFamily, SampleType, VideoFormat};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Arguments & Frame Properties
// ============================================================================

/// Scalar argument passed to a graph function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl Arg {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Float(v) => Some(*v),
            Arg::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int(v as i64)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<Vec<f64>> for Arg {
    fn from(v: Vec<f64>) -> Self {
        Arg::Floats(v)
    }
}

impl From<Vec<i64>> for Arg {
    fn from(v: Vec<i64>) -> Self {
        Arg::Ints(v)
    }
}

/// Frame-level property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Int(i64),
    Float(f64),
    Data(String),
}

impl PropValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&str> {
        match self {
            PropValue::Data(v) => Some(v),
            _ => None,
        }
    }
}

/// Properties attached to every frame of a clip.
pub type FrameProps = BTreeMap<String, PropValue>;

// ============================================================================
// Clip Info
// ============================================================================

/// Video properties of a node. A `None` format or a zero dimension marks a
/// variable clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClipInfo {
    pub format: Option<VideoFormat>,
    pub width: u32,
    pub height: u32,
    pub num_frames: u32,
    pub fps_num: u64,
    pub fps_den: u64,
}

impl ClipInfo {
    pub fn new(format: VideoFormat, width: u32, height: u32) -> Self {
        Self {
            format: Some(format),
            width,
            height,
            num_frames: 1,
            fps_num: 24000,
            fps_den: 1001,
        }
    }

    pub fn with_frames(mut self, num_frames: u32) -> Self {
        self.num_frames = num_frames;
        self
    }

    pub fn with_fps(mut self, fps_num: u64, fps_den: u64) -> Self {
        self.fps_num = fps_num;
        self.fps_den = fps_den;
        self
    }

    pub fn is_constant_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Same properties with a new size.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..*self
        }
    }

    pub fn reformatted(&self, format: VideoFormat) -> Self {
        Self {
            format: Some(format),
            ..*self
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug)]
pub struct Node {
    id: u64,
    function: String,
    inputs: Vec<Clip>,
    args: Vec<(String, Arg)>,
    info: ClipInfo,
    props: FrameProps,
}

/// Cheap, shareable handle to an immutable graph node.
#[derive(Clone)]
pub struct Clip(Arc<Node>);

impl Clip {
    /// Leaf node standing for a clip produced outside of this crate.
    pub fn source(name: &str, info: ClipInfo) -> Result<Self> {
        if let Some(format) = info.format {
            format.checked()?;
        }
        Ok(Self::from_parts(
            "source",
            Vec::new(),
            vec![("name".to_string(), Arg::from(name))],
            info,
            FrameProps::new(),
        ))
    }

    pub(crate) fn from_parts(
        function: impl Into<String>,
        inputs: Vec<Clip>,
        args: Vec<(String, Arg)>,
        info: ClipInfo,
        props: FrameProps,
    ) -> Self {
        Clip(Arc::new(Node {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            function: function.into(),
            inputs,
            args,
            info,
            props,
        }))
    }

    /// Build a node whose props are inherited from its first input.
    pub fn derive(
        function: impl Into<String>,
        inputs: Vec<Clip>,
        args: Vec<(String, Arg)>,
        info: ClipInfo,
    ) -> Self {
        let props = inputs
            .first()
            .map(|clip| clip.props().clone())
            .unwrap_or_default();
        Self::from_parts(function, inputs, args, info, props)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn function(&self) -> &str {
        &self.0.function
    }

    pub fn inputs(&self) -> &[Clip] {
        &self.0.inputs
    }

    pub fn args(&self) -> &[(String, Arg)] {
        &self.0.args
    }

    pub fn arg(&self, name: &str) -> Option<&Arg> {
        self.0
            .args
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn info(&self) -> &ClipInfo {
        &self.0.info
    }

    pub fn width(&self) -> u32 {
        self.0.info.width
    }

    pub fn height(&self) -> u32 {
        self.0.info.height
    }

    pub fn format(&self) -> Option<VideoFormat> {
        self.0.info.format
    }

    pub fn num_frames(&self) -> u32 {
        self.0.info.num_frames
    }

    pub fn props(&self) -> &FrameProps {
        &self.0.props
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.0.props.get(key)
    }

    pub fn ptr_eq(a: &Clip, b: &Clip) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Constant format, or an error naming `func` for variable-format clips.
    pub fn require_format(&self, func: &'static str) -> Result<VideoFormat> {
        self.format().ok_or(Error::VariableFormat { func })
    }

    /// Reject clips whose format or resolution may change between frames.
    pub fn require_constant(&self, func: &'static str) -> Result<VideoFormat> {
        let format = self.require_format(func)?;
        if !self.info().is_constant_resolution() {
            return Err(Error::VariableResolution { func });
        }
        Ok(format)
    }

    /// First node (self included) produced by `function`, searched depth-first.
    pub fn find_upstream(&self, function: &str) -> Option<Clip> {
        let mut stack = vec![self.clone()];
        let mut seen = HashSet::new();
        while let Some(clip) = stack.pop() {
            if !seen.insert(clip.id()) {
                continue;
            }
            if clip.function() == function {
                return Some(clip);
            }
            stack.extend(clip.inputs().iter().rev().cloned());
        }
        None
    }

    /// Export the graph feeding this clip as JSON, inputs before consumers.
    pub fn to_graph_json(&self) -> Result<String> {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        collect_nodes(self, &mut seen, &mut nodes);
        let export = GraphExport {
            output: self.id(),
            nodes,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self
            .format()
            .map(|format| format.to_string())
            .unwrap_or_else(|| "variable".to_string());
        write!(
            f,
            "Clip#{}({} {}x{} {})",
            self.id(),
            self.function(),
            self.width(),
            self.height(),
            format
        )
    }
}

// ============================================================================
// Graph Export
// ============================================================================

#[derive(Debug, Serialize)]
struct GraphExport {
    output: u64,
    nodes: Vec<GraphNode>,
}

#[derive(Debug, Serialize)]
struct GraphNode {
    id: u64,
    function: String,
    inputs: Vec<u64>,
    args: BTreeMap<String, Arg>,
    width: u32,
    height: u32,
    format: Option<String>,
    props: FrameProps,
}

fn collect_nodes(clip: &Clip, seen: &mut HashSet<u64>, out: &mut Vec<GraphNode>) {
    if !seen.insert(clip.id()) {
        return;
    }
    for input in clip.inputs() {
        collect_nodes(input, seen, out);
    }
    out.push(GraphNode {
        id: clip.id(),
        function: clip.function().to_string(),
        inputs: clip.inputs().iter().map(Clip::id).collect(),
        args: clip.args().iter().cloned().collect(),
        width: clip.width(),
        height: clip.height(),
        format: clip.format().map(|format| format.to_string()),
        props: clip.props().clone(),
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn yuv_source(width: u32, height: u32) -> Clip {
        Clip::source(
            "test",
            ClipInfo::new(VideoFormat::YUV420P16, width, height).with_frames(24),
        )
        .expect("source clip")
    }

    pub fn gray_source(width: u32, height: u32) -> Clip {
        Clip::source(
            "test",
            ClipInfo::new(VideoFormat::GRAY16, width, height).with_frames(24),
        )
        .expect("source clip")
    }

    /// Route library logs to the test harness; `RUST_LOG` overrides the level.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("rescale_core=debug".parse().expect("directive")),
            )
            .with_test_writer()
            .try_init();
    }
}
