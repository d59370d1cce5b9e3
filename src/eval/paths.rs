// eval/paths.rs - Connector path geometry
//
// Builds SVG path data joining a node's output connector to the input
// connector of its successor. Anchor rectangles are measured by the host;
// nothing here knows about layout or rendering.
//
// Shapes:
//   quadratic          "U" dip: control point midway, `bulge_depth` below
//                      the lower endpoint
//   cubic              "S" through two fixed control points
//   bottomTopQuadratic inverted bulge through one fixed control point
//
// The fixed control points only make sense for the reference five-node card
// arrangement; they are configuration (`LayoutConfig`), not geometry.

use crate::eval::chain::{NodeId, NodeTable};
use crate::schema::LayoutConfig;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Geometry types ──────────────────────────────────────────────────

/// A measured connector rectangle in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Anchor {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[inline]
    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Formats a point as `x,y` the way SVG path data expects. Integral values
/// print without a fractional part and negative zero prints as `0`.
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", clean(self.x), clean(self.y))
    }
}

#[inline]
fn clean(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

// ── Shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathShape {
    Quadratic,
    Cubic,
    BottomTopQuadratic,
}

impl PathShape {
    /// Parse a host tag. Unknown tags yield `None`: no connector is drawn.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "quadratic" => Some(PathShape::Quadratic),
            "cubic" => Some(PathShape::Cubic),
            "bottomTopQuadratic" => Some(PathShape::BottomTopQuadratic),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            PathShape::Quadratic => "quadratic",
            PathShape::Cubic => "cubic",
            PathShape::BottomTopQuadratic => "bottomTopQuadratic",
        }
    }
}

// ── Path building ───────────────────────────────────────────────────

/// Start and end points of a connector, inset into the connector dots.
pub fn endpoints(output: &Anchor, input: &Anchor, layout: &LayoutConfig) -> (Point, Point) {
    let start = Point::new(output.right() - layout.anchor_inset, output.center_y());
    let end = Point::new(input.left + layout.anchor_inset, input.center_y());
    (start, end)
}

/// SVG path data for `shape` from `output` to `input`.
pub fn build_path(
    output: &Anchor,
    input: &Anchor,
    shape: PathShape,
    layout: &LayoutConfig,
) -> String {
    let (start, end) = endpoints(output, input, layout);
    match shape {
        PathShape::Quadratic => {
            let control = Point::new(
                (start.x + end.x) / 2.0,
                start.y.max(end.y) + layout.bulge_depth,
            );
            format!("M{start} Q{control} {end}")
        }
        PathShape::Cubic => {
            let c1 = layout.cubic_control_1;
            let c2 = layout.cubic_control_2;
            format!("M{start} C{c1} {c2} {end}")
        }
        PathShape::BottomTopQuadratic => {
            let control = layout.bottom_top_control;
            format!("M{start} Q{control} {end}")
        }
    }
}

/// Like `build_path` but takes the raw tag; unknown or missing tags give an
/// empty string.
pub fn build_connector_path(
    output: &Anchor,
    input: &Anchor,
    shape: Option<&str>,
    layout: &LayoutConfig,
) -> String {
    match shape.and_then(PathShape::from_tag) {
        Some(shape) => build_path(output, input, shape, layout),
        None => {
            log::debug!("no connector drawn for path shape {shape:?}");
            String::new()
        }
    }
}

// ── Chain connectors ────────────────────────────────────────────────

/// Connector anchors measured for one node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAnchors {
    pub input: Option<Anchor>,
    pub output: Option<Anchor>,
}

pub type AnchorMap = FxHashMap<NodeId, NodeAnchors>;

/// A rendered edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub from: NodeId,
    pub to: NodeId,
    /// SVG path data.
    pub d: String,
}

/// Build a connector for every `nextFunction` link whose two anchors have
/// been measured. Links without a drawable shape are left out. Sorted by
/// source id.
pub fn connector_paths(
    nodes: &NodeTable,
    anchors: &AnchorMap,
    layout: &LayoutConfig,
) -> Vec<Connector> {
    let mut ids: Vec<NodeId> = nodes.keys().copied().collect();
    ids.sort_unstable();

    ids.into_iter()
        .filter_map(|id| {
            let node = &nodes[&id];
            let next = node.next_function?;
            let output = anchors.get(&id)?.output?;
            let input = anchors.get(&next)?.input?;
            let d = build_connector_path(&output, &input, node.path_shape.as_deref(), layout);
            (!d.is_empty()).then_some(Connector { from: id, to: next, d })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::chain::FunctionNode;

    fn out_anchor() -> Anchor {
        Anchor::new(100.0, 200.0, 20.0, 20.0)
    }

    fn in_anchor() -> Anchor {
        Anchor::new(300.0, 180.0, 20.0, 20.0)
    }

    #[test]
    fn endpoints_are_inset_and_centered() {
        let (start, end) = endpoints(&out_anchor(), &in_anchor(), &LayoutConfig::default());
        assert_eq!(start, Point::new(112.0, 210.0));
        assert_eq!(end, Point::new(308.0, 190.0));
    }

    #[test]
    fn quadratic_dips_below_both_endpoints() {
        let layout = LayoutConfig::default();
        let d = build_path(&out_anchor(), &in_anchor(), PathShape::Quadratic, &layout);
        assert_eq!(d, "M112,210 Q210,260 308,190");
    }

    #[test]
    fn cubic_uses_fixed_controls() {
        let d = build_path(&out_anchor(), &in_anchor(), PathShape::Cubic, &LayoutConfig::default());
        assert_eq!(d, "M112,210 C1029,556 771,525 308,190");
    }

    #[test]
    fn bottom_top_uses_fixed_control() {
        let d = build_path(
            &out_anchor(),
            &in_anchor(),
            PathShape::BottomTopQuadratic,
            &LayoutConfig::default(),
        );
        assert_eq!(d, "M112,210 Q1264,571 308,190");
    }

    #[test]
    fn custom_layout_changes_geometry() {
        let layout = LayoutConfig {
            anchor_inset: 0.0,
            bulge_depth: 10.0,
            ..LayoutConfig::default()
        };
        let d = build_path(&out_anchor(), &in_anchor(), PathShape::Quadratic, &layout);
        assert_eq!(d, "M120,210 Q210,220 300,190");
    }

    #[test]
    fn fractional_coordinates_are_kept() {
        let output = Anchor::new(0.0, 0.0, 10.5, 5.0);
        let input = Anchor::new(50.0, 0.0, 10.0, 5.0);
        let d = build_path(&output, &input, PathShape::Quadratic, &LayoutConfig::default());
        assert_eq!(d, "M2.5,2.5 Q30.25,52.5 58,2.5");
    }

    #[test]
    fn unknown_or_missing_shape_is_empty() {
        let layout = LayoutConfig::default();
        assert_eq!(build_connector_path(&out_anchor(), &in_anchor(), Some("unknown"), &layout), "");
        assert_eq!(build_connector_path(&out_anchor(), &in_anchor(), None, &layout), "");
        let dot = Anchor::default();
        assert_eq!(build_connector_path(&dot, &dot, Some("spline"), &layout), "");
    }

    #[test]
    fn tags_round_trip() {
        for shape in [PathShape::Quadratic, PathShape::Cubic, PathShape::BottomTopQuadratic] {
            assert_eq!(PathShape::from_tag(shape.as_tag()), Some(shape));
        }
        assert_eq!(PathShape::from_tag("Quadratic"), None);
    }

    #[test]
    fn connectors_follow_next_function_links() {
        let nodes: NodeTable = [
            FunctionNode::new(1, "x", Some(2), Some("quadratic")),
            FunctionNode::new(2, "x", Some(3), Some("mystery")),
            FunctionNode::new(3, "x", None, None),
        ]
        .into_iter()
        .map(|n| (n.id, n))
        .collect();

        let mut anchors = AnchorMap::default();
        anchors.insert(1, NodeAnchors { input: None, output: Some(out_anchor()) });
        anchors.insert(2, NodeAnchors { input: Some(in_anchor()), output: Some(out_anchor()) });
        anchors.insert(3, NodeAnchors { input: Some(in_anchor()), output: None });

        let connectors = connector_paths(&nodes, &anchors, &LayoutConfig::default());
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].from, 1);
        assert_eq!(connectors[0].to, 2);
        assert_eq!(connectors[0].d, "M112,210 Q210,260 308,190");
    }

    #[test]
    fn connectors_skip_unmeasured_anchors() {
        let nodes: NodeTable = [
            FunctionNode::new(1, "x", Some(2), Some("cubic")),
            FunctionNode::new(2, "x", None, None),
        ]
        .into_iter()
        .map(|n| (n.id, n))
        .collect();

        let mut anchors = AnchorMap::default();
        anchors.insert(1, NodeAnchors { input: None, output: Some(out_anchor()) });
        assert!(connector_paths(&nodes, &anchors, &LayoutConfig::default()).is_empty());
    }
}
