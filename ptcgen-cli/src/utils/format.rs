//! Formatting utilities

use glam::Vec3;
use ptcgen::{PlaneSurface, Trigger, TriggerDef, TypeFilter};

/// Format a position with one decimal
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", v.x, v.y, v.z)
}

fn format_surface(surface: PlaneSurface) -> &'static str {
    match surface {
        PlaneSurface::Floor => "floor",
        PlaneSurface::Ceiling => "ceiling",
    }
}

fn format_types(primary: u32, secondary: Option<u32>) -> String {
    match secondary {
        Some(secondary) => format!("{primary}/{secondary}"),
        None => primary.to_string(),
    }
}

/// Describe a running generator's trigger
pub fn format_trigger(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Source { entity: Some(handle) } => format!("entity {}", handle.index),
        Trigger::Source { entity: None } => "detached".to_string(),
        Trigger::Plane { sector, surface } => {
            format!("sector {} {}", sector.0, format_surface(*surface))
        }
        Trigger::TypeMatch(TypeFilter::Any) => "any type".to_string(),
        Trigger::TypeMatch(TypeFilter::Types { primary, secondary }) => {
            format!("type {}", format_types(*primary, *secondary))
        }
        Trigger::Untriggered { center } => format!("point {}", format_vec3(*center)),
    }
}

/// Describe a definition's trigger
pub fn format_trigger_def(trigger: &TriggerDef) -> String {
    match trigger {
        TriggerDef::None => "-".to_string(),
        TriggerDef::EntityState { state } => format!("state {state}"),
        TriggerDef::EntityType { primary, secondary } => {
            format!("type {}", format_types(*primary, *secondary))
        }
        TriggerDef::AnyEntityType => "any type".to_string(),
        TriggerDef::Damage { type_id } => format!("damage {type_id}"),
        TriggerDef::Plane { material, surface } => match surface {
            Some(surface) => format!("plane {material} {}", format_surface(*surface)),
            None => format!("plane {material}"),
        },
        TriggerDef::Map { map } => format!("map {map}"),
    }
}

/// Format an optional tic limit
pub fn format_limit(limit: Option<u32>) -> String {
    limit.map_or_else(|| "-".to_string(), |tics| tics.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptcgen::{EntityHandle, SectorId};

    #[test]
    fn test_format_trigger() {
        let handle = EntityHandle {
            index: 4,
            generation: 2,
        };
        assert_eq!(
            format_trigger(&Trigger::Source {
                entity: Some(handle)
            }),
            "entity 4"
        );
        assert_eq!(
            format_trigger(&Trigger::Plane {
                sector: SectorId(3),
                surface: PlaneSurface::Ceiling
            }),
            "sector 3 ceiling"
        );
        assert_eq!(
            format_trigger(&Trigger::Untriggered {
                center: Vec3::new(1.0, 2.5, 3.0)
            }),
            "point (1.0, 2.5, 3.0)"
        );
    }

    #[test]
    fn test_format_trigger_def() {
        assert_eq!(
            format_trigger_def(&TriggerDef::EntityType {
                primary: 2001,
                secondary: Some(2002)
            }),
            "type 2001/2002"
        );
        assert_eq!(
            format_trigger_def(&TriggerDef::Plane {
                material: "NUKAGE1".to_string(),
                surface: None
            }),
            "plane NUKAGE1"
        );
        assert_eq!(format_limit(None), "-");
        assert_eq!(format_limit(Some(35)), "35");
    }
}
