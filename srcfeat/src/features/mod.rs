//! Flattening of extraction results into feature records
//!
//! A [`FeatureSchema`] lists the output columns and where each value comes
//! from; [`assemble`] resolves those sources against one
//! [`ExtractionResult`].

pub mod record;
pub mod schema;

pub use record::{FeatureRecord, FeatureValue};
pub use schema::{FeatureColumn, FeatureSchema, FeatureSource, MapKind};

use crate::moments::{MomentSet, SENTINEL};
use crate::pipeline::ExtractionResult;

/// Statistics and moments of one pairwise map
fn map_entry(result: &ExtractionResult, map: MapKind, pair: usize) -> Option<(Vec<f64>, &MomentSet)> {
    match map {
        MapKind::Ssim => result
            .similarity
            .as_ref()
            .and_then(|s| s.get(pair))
            .map(|s| (s.stats.to_array().to_vec(), &s.moments)),
        MapKind::ColorIndex => result
            .color_index
            .as_ref()
            .and_then(|c| c.get(pair))
            .map(|c| (c.stats.to_array().to_vec(), &c.moments)),
    }
}

fn resolve(source: FeatureSource, result: &ExtractionResult) -> FeatureValue {
    let float = |v: Option<f64>| FeatureValue::Float(v.unwrap_or(SENTINEL));
    match source {
        FeatureSource::Name => FeatureValue::Text(result.info.sname.clone()),
        FeatureSource::ClassId => FeatureValue::from(&result.info.classid),
        FeatureSource::Flux { channel } => float(result.fluxes.get(channel).copied()),
        FeatureSource::Color { channel } => float(result.colors.get(channel).copied()),
        FeatureSource::Iou { pair } => float(result.geometry.get(pair).map(|g| g.iou)),
        FeatureSource::PeakDistance { pair } => {
            float(result.geometry.get(pair).map(|g| g.peak_distance))
        }
        FeatureSource::Separation { pair } => {
            float(result.geometry.get(pair).map(|g| g.separation))
        }
        FeatureSource::ChannelMoment {
            channel,
            kind,
            index,
        } => float(result.moments.get(channel).map(|m| m.get(kind, index))),
        FeatureSource::MapStat { map, pair, stat } => float(
            map_entry(result, map, pair).and_then(|(stats, _)| stats.get(stat).copied()),
        ),
        FeatureSource::MapMoment {
            map,
            pair,
            kind,
            index,
        } => float(map_entry(result, map, pair).map(|(_, m)| m.get(kind, index))),
    }
}

/// Build the feature record of one image
pub fn assemble(schema: &FeatureSchema, result: &ExtractionResult) -> FeatureRecord {
    let mut record = FeatureRecord::new();
    for column in schema.columns() {
        record.push(column.name.clone(), resolve(column.source, result));
    }
    record
}
