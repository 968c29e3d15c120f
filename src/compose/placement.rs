use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Dimension, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    #[default]
    TopCenter,
    TopRight,
    MidLeft,
    MidCenter,
    MidRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Start,
    Center,
    End,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MidLeft,
        Anchor::MidCenter,
        Anchor::MidRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::MidLeft => "mid-left",
            Anchor::MidCenter => "mid-center",
            Anchor::MidRight => "mid-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }

    // (horizontal, vertical)
    fn edges(self) -> (Edge, Edge) {
        match self {
            Anchor::TopLeft => (Edge::Start, Edge::Start),
            Anchor::TopCenter => (Edge::Center, Edge::Start),
            Anchor::TopRight => (Edge::End, Edge::Start),
            Anchor::MidLeft => (Edge::Start, Edge::Center),
            Anchor::MidCenter => (Edge::Center, Edge::Center),
            Anchor::MidRight => (Edge::End, Edge::Center),
            Anchor::BottomLeft => (Edge::Start, Edge::End),
            Anchor::BottomCenter => (Edge::Center, Edge::End),
            Anchor::BottomRight => (Edge::End, Edge::End),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Anchor::ALL.iter().map(Anchor::as_str).collect();
                format!("unknown anchor '{}' (expected one of {})", value, names.join(", "))
            })
    }
}

/// Paste position of a `size` box on `canvas`. Each axis is floored at
/// `padding`, so a box that does not fit hugs the start edge.
pub fn resolve_position(anchor: Anchor, canvas: Dimension, size: Dimension, padding: u32) -> Point {
    let (horizontal, vertical) = anchor.edges();
    Point {
        x: resolve_axis(horizontal, canvas.width, size.width, padding),
        y: resolve_axis(vertical, canvas.height, size.height, padding),
    }
}

fn resolve_axis(edge: Edge, canvas: u32, size: u32, padding: u32) -> u32 {
    let canvas = i64::from(canvas);
    let size = i64::from(size);
    let pad = i64::from(padding);
    let value = match edge {
        Edge::Start => pad,
        Edge::Center => (canvas - size).div_euclid(2),
        Edge::End => canvas - pad - size,
    };
    // value >= padding here, and padding itself is a u32
    u32::try_from(value.max(pad)).unwrap_or(padding)
}
