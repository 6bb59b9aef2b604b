//! Polygon map built from convex cells

use std::collections::HashMap;

use glam::Vec2;

use crate::error::{PtcError, Result};
use crate::world::{
    Aabb2, CellId, CellInfo, LineId, LineInfo, MapGeometry, PlaneSurface, SectorId, SectorInfo,
};

/// Side of a square blockmap block
pub const BLOCK_SIZE: f32 = 128.0;

/// One sector, made of convex cells
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SectorDef {
    /// Floor height
    pub floor: f32,
    /// Ceiling height
    pub ceiling: f32,
    /// Floor is open sky
    pub floor_sky: bool,
    /// Ceiling is open sky
    pub ceiling_sky: bool,
    /// Floor material name
    pub floor_material: Option<String>,
    /// Ceiling material name
    pub ceiling_material: Option<String>,
    /// Convex polygons covering the sector, in either winding
    pub cells: Vec<Vec<Vec2>>,
}

impl Default for SectorDef {
    fn default() -> Self {
        Self {
            floor: 0.0,
            ceiling: 128.0,
            floor_sky: false,
            ceiling_sky: false,
            floor_material: None,
            ceiling_material: None,
            cells: Vec::new(),
        }
    }
}

impl SectorDef {
    /// Rectangular sector with a single cell
    pub fn rect(min: Vec2, max: Vec2, floor: f32, ceiling: f32) -> Self {
        Self {
            floor,
            ceiling,
            cells: vec![vec![
                min,
                Vec2::new(max.x, min.y),
                max,
                Vec2::new(min.x, max.y),
            ]],
            ..Default::default()
        }
    }
}

/// An extra line not derived from cell edges
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineDef {
    /// Start vertex
    pub v1: Vec2,
    /// End vertex
    pub v2: Vec2,
    /// Sector index on the right-hand side
    pub front: Option<u32>,
    /// Sector index on the left-hand side
    #[cfg_attr(feature = "serde", serde(default))]
    pub back: Option<u32>,
}

/// Authoring form of a sandbox map
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapDef {
    /// Map identifier
    pub id: String,
    /// Sectors; their index is their [`SectorId`]
    pub sectors: Vec<SectorDef>,
    /// Free-standing lines
    pub lines: Vec<LineDef>,
}

#[derive(Debug, Clone)]
struct Cell {
    sector: SectorId,
    vertices: Vec<Vec2>,
    bounds: Aabb2,
}

impl Cell {
    fn contains(&self, point: Vec2) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            (b - a).perp_dot(point - a) >= 0.0
        })
    }
}

/// Polygon vertices in counter-clockwise order, or `None` if not convex
fn convex_ccw(polygon: &[Vec2]) -> Option<Vec<Vec2>> {
    let n = polygon.len();
    if n < 3 || polygon.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let twice_area: f32 = (0..n)
        .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
        .sum();
    if twice_area.abs() <= f32::EPSILON {
        return None;
    }
    let mut vertices = polygon.to_vec();
    if twice_area < 0.0 {
        vertices.reverse();
    }
    let convex = (0..n).all(|i| {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];
        (b - a).perp_dot(c - b) >= 0.0
    });
    convex.then_some(vertices)
}

type EdgeKey = [u32; 4];

fn edge_key(a: Vec2, b: Vec2) -> EdgeKey {
    // Adding zero folds -0.0 into 0.0
    [
        (a.x + 0.0).to_bits(),
        (a.y + 0.0).to_bits(),
        (b.x + 0.0).to_bits(),
        (b.y + 0.0).to_bits(),
    ]
}

fn block_of(point: Vec2) -> (i32, i32) {
    (
        (point.x / BLOCK_SIZE).floor() as i32,
        (point.y / BLOCK_SIZE).floor() as i32,
    )
}

/// In-memory [`MapGeometry`] with a blockmap for line queries
///
/// Lines are derived from cell edges: an edge shared with a cell of another
/// sector becomes a two-sided line, an edge shared within one sector is
/// dropped, and every other edge becomes a one-sided wall. Shared edges must
/// match vertex for vertex.
#[derive(Debug, Clone)]
pub struct SandboxMap {
    id: String,
    sectors: Vec<SectorInfo>,
    materials: Vec<[Option<String>; 2]>,
    lines: Vec<LineInfo>,
    cells: Vec<Cell>,
    blocks: HashMap<(i32, i32), Vec<LineId>>,
    block_min: (i32, i32),
    block_max: (i32, i32),
}

impl SandboxMap {
    /// Build and validate a map
    pub fn build(def: &MapDef) -> Result<Self> {
        if def.sectors.is_empty() {
            return Err(PtcError::InvalidGeometry("map has no sectors".to_string()));
        }

        let mut sectors = Vec::with_capacity(def.sectors.len());
        let mut materials = Vec::with_capacity(def.sectors.len());
        let mut cells = Vec::new();
        for (index, sector) in def.sectors.iter().enumerate() {
            let id = SectorId(u32::try_from(index).map_err(|_| {
                PtcError::InvalidGeometry("too many sectors".to_string())
            })?);
            if sector.floor.is_nan() || sector.ceiling.is_nan() || sector.floor > sector.ceiling {
                return Err(PtcError::InvalidGeometry(format!(
                    "sector {index}: floor {} above ceiling {}",
                    sector.floor, sector.ceiling
                )));
            }
            let mut bounds: Option<Aabb2> = None;
            for (cell_index, polygon) in sector.cells.iter().enumerate() {
                let vertices = convex_ccw(polygon).ok_or_else(|| {
                    PtcError::InvalidGeometry(format!(
                        "sector {index} cell {cell_index}: not a convex polygon"
                    ))
                })?;
                let Some(cell_bounds) = Aabb2::enclosing(vertices.iter().copied()) else {
                    continue;
                };
                bounds = Some(match bounds {
                    Some(b) => Aabb2::from_points(b.min.min(cell_bounds.min), b.max.max(cell_bounds.max)),
                    None => cell_bounds,
                });
                cells.push(Cell {
                    sector: id,
                    vertices,
                    bounds: cell_bounds,
                });
            }
            let Some(bounds) = bounds else {
                return Err(PtcError::InvalidGeometry(format!(
                    "sector {index} has no cells"
                )));
            };
            sectors.push(SectorInfo {
                floor: sector.floor,
                ceiling: sector.ceiling,
                floor_sky: sector.floor_sky,
                ceiling_sky: sector.ceiling_sky,
                bounds,
            });
            materials.push([sector.floor_material.clone(), sector.ceiling_material.clone()]);
        }

        let mut lines = edge_lines(&cells);
        for (index, line) in def.lines.iter().enumerate() {
            let resolve = |side: Option<u32>| -> Result<Option<SectorId>> {
                match side {
                    Some(s) if (s as usize) < sectors.len() => Ok(Some(SectorId(s))),
                    Some(s) => Err(PtcError::InvalidGeometry(format!(
                        "line {index}: unknown sector {s}"
                    ))),
                    None => Ok(None),
                }
            };
            if line.v1 == line.v2 || !line.v1.is_finite() || !line.v2.is_finite() {
                return Err(PtcError::InvalidGeometry(format!(
                    "line {index}: degenerate segment"
                )));
            }
            lines.push(LineInfo {
                v1: line.v1,
                v2: line.v2,
                front: resolve(line.front)?,
                back: resolve(line.back)?,
            });
        }

        let mut map = Self {
            id: def.id.clone(),
            sectors,
            materials,
            lines,
            cells,
            blocks: HashMap::new(),
            block_min: (0, 0),
            block_max: (0, 0),
        };
        map.rebuild_blockmap()?;
        Ok(map)
    }

    /// Single rectangular room
    pub fn rect_room(id: &str, min: Vec2, max: Vec2, floor: f32, ceiling: f32) -> Result<Self> {
        Self::build(&MapDef {
            id: id.to_string(),
            sectors: vec![SectorDef::rect(min, max, floor, ceiling)],
            lines: Vec::new(),
        })
    }

    fn rebuild_blockmap(&mut self) -> Result<()> {
        let ids = (0..self.lines.len()).map(|i| {
            u32::try_from(i)
                .map(LineId)
                .map_err(|_| PtcError::InvalidGeometry("too many lines".to_string()))
        });
        let mut blocks: HashMap<(i32, i32), Vec<LineId>> = HashMap::new();
        let mut block_min = (i32::MAX, i32::MAX);
        let mut block_max = (i32::MIN, i32::MIN);
        for (line, id) in self.lines.iter().zip(ids) {
            let id = id?;
            let bounds = line.bounds();
            let lo = block_of(bounds.min);
            let hi = block_of(bounds.max);
            block_min = (block_min.0.min(lo.0), block_min.1.min(lo.1));
            block_max = (block_max.0.max(hi.0), block_max.1.max(hi.1));
            for bx in lo.0..=hi.0 {
                for by in lo.1..=hi.1 {
                    blocks.entry((bx, by)).or_default().push(id);
                }
            }
        }
        self.blocks = blocks;
        self.block_min = block_min;
        self.block_max = block_max;
        Ok(())
    }

    /// Number of lines, derived and free-standing
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Number of convex cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// All lines in id order
    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    /// Move a sector plane; attached particles follow it
    pub fn set_plane_height(&mut self, sector: SectorId, surface: PlaneSurface, height: f32) {
        if let Some(info) = self.sectors.get_mut(sector.0 as usize) {
            match surface {
                PlaneSurface::Floor => info.floor = height,
                PlaneSurface::Ceiling => info.ceiling = height,
            }
        }
    }
}

/// Lines along cell edges that separate sectors or face the void
fn edge_lines(cells: &[Cell]) -> Vec<LineInfo> {
    let mut owners: HashMap<EdgeKey, SectorId> = HashMap::new();
    for cell in cells {
        let n = cell.vertices.len();
        for i in 0..n {
            let a = cell.vertices[i];
            let b = cell.vertices[(i + 1) % n];
            owners.insert(edge_key(a, b), cell.sector);
        }
    }

    let mut lines = Vec::new();
    for cell in cells {
        let n = cell.vertices.len();
        for i in 0..n {
            let a = cell.vertices[i];
            let b = cell.vertices[(i + 1) % n];
            // Cells wind counter-clockwise, so walking b -> a keeps the
            // cell's sector on the right.
            match owners.get(&edge_key(b, a)) {
                // Internal edge, or already emitted from the other side
                Some(&other) if other <= cell.sector => {}
                Some(&other) => lines.push(LineInfo {
                    v1: b,
                    v2: a,
                    front: Some(cell.sector),
                    back: Some(other),
                }),
                None => lines.push(LineInfo {
                    v1: b,
                    v2: a,
                    front: Some(cell.sector),
                    back: None,
                }),
            }
        }
    }
    lines
}

impl MapGeometry for SandboxMap {
    fn map_id(&self) -> &str {
        &self.id
    }

    fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    fn sector(&self, id: SectorId) -> Option<SectorInfo> {
        self.sectors.get(id.0 as usize).copied()
    }

    fn line(&self, id: LineId) -> Option<LineInfo> {
        self.lines.get(id.0 as usize).copied()
    }

    fn lines_in_box(&self, bounds: &Aabb2, visit: &mut dyn FnMut(LineId) -> bool) -> bool {
        if self.blocks.is_empty() {
            return true;
        }
        let lo = block_of(bounds.min);
        let hi = block_of(bounds.max);
        let (x0, y0) = (lo.0.max(self.block_min.0), lo.1.max(self.block_min.1));
        let (x1, y1) = (hi.0.min(self.block_max.0), hi.1.min(self.block_max.1));
        for bx in x0..=x1 {
            for by in y0..=y1 {
                let Some(list) = self.blocks.get(&(bx, by)) else {
                    continue;
                };
                for &id in list {
                    if !visit(id) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn cell_at(&self, point: Vec2) -> Option<CellInfo> {
        let (index, cell) = self
            .cells
            .iter()
            .enumerate()
            .find(|(_, cell)| cell.contains(point))?;
        Some(CellInfo {
            id: CellId(u32::try_from(index).ok()?),
            sector: cell.sector,
            bounds: cell.bounds,
        })
    }

    fn plane_material(&self, sector: SectorId, surface: PlaneSurface) -> Option<&str> {
        let [floor, ceiling] = self.materials.get(sector.0 as usize)?;
        match surface {
            PlaneSurface::Floor => floor.as_deref(),
            PlaneSurface::Ceiling => ceiling.as_deref(),
        }
    }
}
