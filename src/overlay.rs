//! Text sidecars: OPR mesh overlays and TXA frame tables.
//!
//! An OPR file is Shift-JIS, line oriented. `Mesh = "name"` (or
//! `MeshPart = "name"`) selects the mesh the following keys apply to.
//! A TXA file is one ASCII integer per line, indexed by the playback
//! frame to pick a color-texture frame.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::strings::decode_sjis;

/// Rendering attributes attached to one mesh by an OPR file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshOverlay {
    pub additive_blending: bool,
    pub no_edge: bool,
    pub edge_color: Option<Vec<f32>>,
    pub edge_size: Option<f32>,
    pub uv_scroll: Option<(f32, f32)>,
}

/// All overlays of one OPR file, keyed by mesh name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OprOverlay {
    entries: IndexMap<String, MeshOverlay>,
}

impl OprOverlay {
    /// Parsing never fails; malformed lines are warned and skipped.
    pub fn parse(data: &[u8]) -> OprOverlay {
        let text = decode_sjis(data);
        let mut entries: IndexMap<String, MeshOverlay> = IndexMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!(line, "OPR line without '='");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if key == "Mesh" || key == "MeshPart" {
                let name = value.trim_matches('"').to_owned();
                entries.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some(name) = &current else {
                // Keys before the first header have nothing to bind to.
                continue;
            };
            let overlay = entries.get_mut(name).expect("selected mesh exists");

            match key {
                "BlendMode" => {
                    if value == "Add" {
                        overlay.additive_blending = true;
                    }
                }
                "Edge" => {
                    if value == "0" {
                        overlay.no_edge = true;
                    }
                }
                "EdgeColor" => match parse_number_list(value) {
                    Some(color) => overlay.edge_color = Some(color),
                    None => warn!(value, "bad EdgeColor"),
                },
                "EdgeSize" => match value.parse::<f32>() {
                    Ok(size) => overlay.edge_size = Some(size),
                    Err(_) => warn!(value, "bad EdgeSize"),
                },
                "UVScroll" => match parse_number_list(value).as_deref() {
                    Some([u, v]) => overlay.uv_scroll = Some((*u, *v)),
                    _ => warn!(value, "bad UVScroll"),
                },
                _ => warn!(key, "unknown OPR key"),
            }
        }

        OprOverlay { entries }
    }

    pub fn get(&self, mesh_name: &str) -> Option<&MeshOverlay> {
        self.entries.get(mesh_name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `(1, 0.5, 0)` -> `[1.0, 0.5, 0.0]`.
fn parse_number_list(value: &str) -> Option<Vec<f32>> {
    let inner = value.strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

/// Parse a TXA table: one frame index per line.
pub fn parse_txa(data: &[u8]) -> Vec<u32> {
    let text = decode_sjis(data);
    let mut table = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u32>() {
            Ok(value) => table.push(value),
            Err(_) => warn!(line, "bad TXA line"),
        }
    }
    table
}
