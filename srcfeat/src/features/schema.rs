//! Declarative description of the output columns
//!
//! The schema depends only on the channel count, the reference channel and
//! the output flags, so every image of a run shares the same header.

use shared::image_proc::moments::{NUM_CENTRAL_MOMENTS, NUM_HU_MOMENTS, NUM_ZERNIKE_MOMENTS};

use crate::config::OutputOptions;
use crate::geometry::channel_pairs;
use crate::moments::MomentKind;

/// Statistic names of SSIM maps, in output order
pub const SSIM_STAT_NAMES: [&str; 6] = ["mean", "min", "max", "std", "median", "mad"];

/// Statistic names of colour-index maps, in output order
pub const CIND_STAT_NAMES: [&str; 8] = ["mean", "min", "max", "std", "median", "mad", "skew", "kurt"];

/// Pairwise map family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    Ssim,
    ColorIndex,
}

impl MapKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            MapKind::Ssim => "ssim",
            MapKind::ColorIndex => "cind",
        }
    }

    pub fn stat_names(&self) -> &'static [&'static str] {
        match self {
            MapKind::Ssim => &SSIM_STAT_NAMES,
            MapKind::ColorIndex => &CIND_STAT_NAMES,
        }
    }
}

/// Where the value of a column comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    Name,
    Flux { channel: usize },
    Color { channel: usize },
    Iou { pair: usize },
    PeakDistance { pair: usize },
    Separation { pair: usize },
    ChannelMoment {
        channel: usize,
        kind: MomentKind,
        index: usize,
    },
    MapStat {
        map: MapKind,
        pair: usize,
        stat: usize,
    },
    MapMoment {
        map: MapKind,
        pair: usize,
        kind: MomentKind,
        index: usize,
    },
    ClassId,
}

/// One named output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: String,
    pub source: FeatureSource,
}

/// Ordered list of output columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

/// Moment indices saved for a family; `skip_first` drops the constant
/// leading Zernike magnitude of channel moments
fn moment_indices(kind: MomentKind, opts: &OutputOptions, skip_first: bool) -> Vec<usize> {
    match kind {
        MomentKind::Central if opts.save_mom_pars => {
            (0..opts.save_mom_max_no.min(NUM_CENTRAL_MOMENTS)).collect()
        }
        MomentKind::Hu if opts.save_hu_mom_pars => (0..NUM_HU_MOMENTS).collect(),
        MomentKind::Zernike if opts.save_zern_mom_pars => {
            let start = usize::from(skip_first);
            (start..NUM_ZERNIKE_MOMENTS).collect()
        }
        _ => Vec::new(),
    }
}

const MOMENT_KINDS: [MomentKind; 3] = [MomentKind::Central, MomentKind::Hu, MomentKind::Zernike];

impl FeatureSchema {
    /// Build the schema
    ///
    /// # Arguments
    /// * `nchannels` - Number of channels in every cube
    /// * `refch` - Reference channel for the colour columns
    /// * `opts` - Output flags selecting the optional groups
    pub fn new(nchannels: usize, refch: usize, opts: &OutputOptions) -> Self {
        let mut columns = Vec::new();
        let mut push = |name: String, source: FeatureSource| {
            columns.push(FeatureColumn { name, source })
        };

        push("sname".to_string(), FeatureSource::Name);

        for channel in 0..nchannels {
            push(format!("flux_ch{}", channel + 1), FeatureSource::Flux { channel });
        }
        for channel in (0..nchannels).filter(|&k| k != refch) {
            push(
                format!("color_ch{}_{}", refch + 1, channel + 1),
                FeatureSource::Color { channel },
            );
        }

        let pairs = channel_pairs(nchannels);
        for (pair, p) in pairs.iter().enumerate() {
            push(format!("iou_{}", p.suffix()), FeatureSource::Iou { pair });
        }
        for (pair, p) in pairs.iter().enumerate() {
            push(format!("dpeak_{}", p.suffix()), FeatureSource::PeakDistance { pair });
        }
        for (pair, p) in pairs.iter().enumerate() {
            push(format!("sep_{}", p.suffix()), FeatureSource::Separation { pair });
        }

        for kind in MOMENT_KINDS {
            let indices = moment_indices(kind, opts, true);
            for channel in 0..nchannels {
                for &index in &indices {
                    push(
                        format!("{}{}_ch{}", kind.prefix(), index + 1, channel + 1),
                        FeatureSource::ChannelMoment {
                            channel,
                            kind,
                            index,
                        },
                    );
                }
            }
        }

        let maps = [
            (MapKind::Ssim, opts.save_ssim_pars),
            (MapKind::ColorIndex, opts.save_cind_pars),
        ];
        for (map, enabled) in maps {
            if !enabled {
                continue;
            }
            for (pair, p) in pairs.iter().enumerate() {
                for (stat, name) in map.stat_names().iter().enumerate() {
                    push(
                        format!("{}_{name}_{}", map.prefix(), p.suffix()),
                        FeatureSource::MapStat { map, pair, stat },
                    );
                }
                for kind in MOMENT_KINDS {
                    for index in moment_indices(kind, opts, false) {
                        push(
                            format!("{}_{}{}_{}", map.prefix(), kind.prefix(), index + 1, p.suffix()),
                            FeatureSource::MapMoment {
                                map,
                                pair,
                                kind,
                                index,
                            },
                        );
                    }
                }
            }
        }

        push("id".to_string(), FeatureSource::ClassId);

        Self { columns }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order
    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = FeatureSchema::new(3, 0, &OutputOptions::default());
        assert_eq!(
            schema.header(),
            vec![
                "sname",
                "flux_ch1",
                "flux_ch2",
                "flux_ch3",
                "color_ch1_2",
                "color_ch1_3",
                "iou_ch1_2",
                "iou_ch1_3",
                "iou_ch2_3",
                "dpeak_ch1_2",
                "dpeak_ch1_3",
                "dpeak_ch2_3",
                "sep_ch1_2",
                "sep_ch1_3",
                "sep_ch2_3",
                "id",
            ]
        );
    }

    #[test]
    fn test_reference_channel_colours() {
        let schema = FeatureSchema::new(3, 1, &OutputOptions::default());
        let header = schema.header();
        assert!(header.contains(&"color_ch2_1"));
        assert!(header.contains(&"color_ch2_3"));
        assert!(!header.contains(&"color_ch2_2"));
    }

    #[test]
    fn test_moment_columns() {
        let opts = OutputOptions {
            save_mom_pars: true,
            save_mom_max_no: 2,
            save_hu_mom_pars: true,
            save_zern_mom_pars: true,
            ..Default::default()
        };
        let schema = FeatureSchema::new(2, 0, &opts);
        let header = schema.header();

        // 2 central + 7 Hu + 8 Zernike per channel
        assert_eq!(schema.len(), 1 + 2 + 1 + 3 + 2 * (2 + 7 + 8) + 1);
        assert!(header.contains(&"mom2_ch2"));
        assert!(!header.contains(&"mom3_ch1"));
        assert!(header.contains(&"humom7_ch1"));
        assert!(!header.contains(&"zernmom1_ch1"));
        assert!(header.contains(&"zernmom9_ch2"));

        let mom = header.iter().position(|&h| h == "mom1_ch2").unwrap();
        let hu = header.iter().position(|&h| h == "humom1_ch1").unwrap();
        assert!(mom < hu);
    }

    #[test]
    fn test_map_columns_order() {
        let opts = OutputOptions {
            save_mom_pars: true,
            save_zern_mom_pars: true,
            save_ssim_pars: true,
            save_cind_pars: true,
            ..Default::default()
        };
        let schema = FeatureSchema::new(2, 0, &opts);
        let header = schema.header();
        let pos = |name: &str| header.iter().position(|&h| h == name).unwrap();

        assert!(pos("ssim_mean_ch1_2") < pos("ssim_mad_ch1_2"));
        assert!(pos("ssim_mad_ch1_2") < pos("ssim_mom1_ch1_2"));
        assert!(pos("ssim_mom1_ch1_2") < pos("ssim_zernmom1_ch1_2"));
        assert!(pos("ssim_zernmom9_ch1_2") < pos("cind_mean_ch1_2"));
        assert!(pos("cind_kurt_ch1_2") < pos("cind_mom1_ch1_2"));
        assert_eq!(*header.last().unwrap(), "id");
        assert!(!header.iter().any(|h| h.starts_with("ssim_humom")));
    }

    #[test]
    fn test_single_channel_has_no_pairs() {
        let opts = OutputOptions {
            save_ssim_pars: true,
            ..Default::default()
        };
        let schema = FeatureSchema::new(1, 0, &opts);
        assert_eq!(schema.header(), vec!["sname", "flux_ch1", "id"]);
    }
}
