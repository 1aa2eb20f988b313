//! Aggregate command: merge SL1L2 partial sums across `verify` outputs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use verif_evaluate::{CiConfig, CntInfo, Sl1l2Info, compute_cnt_from_sl1l2, to_json};

use crate::cli::AggregateArgs;

/// The parts of a `verify` output that aggregation reads. Other fields
/// are ignored.
#[derive(Debug, Deserialize)]
struct PartialFile {
    fcst_var: String,
    obs_var: String,
    partitions: Vec<PartialPartition>,
}

#[derive(Debug, Deserialize)]
struct PartialPartition {
    msg_typ: String,
    mask: String,
    interp_mthd: String,
    interp_pnts: usize,
    sl1l2: Sl1l2Info,
}

/// Partitions with the same key are merged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
struct GroupKey {
    fcst_var: String,
    obs_var: String,
    msg_typ: String,
    mask: String,
    interp_mthd: String,
    interp_pnts: usize,
}

#[derive(Debug, Serialize)]
pub struct AggregateOutput {
    pub n_files: usize,
    pub groups: Vec<AggregateGroup>,
}

#[derive(Debug, Serialize)]
pub struct AggregateGroup {
    #[serde(flatten)]
    key: GroupKey,
    /// Number of partial sums merged into this group.
    pub n_cases: usize,
    pub sl1l2: Sl1l2Info,
    pub cnt: CntInfo,
    /// Anomaly statistics, present when any case had climatology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anom_cnt: Option<CntInfo>,
}

fn read_partial(path: &Path) -> Result<PartialFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read statistics: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse statistics: {}", path.display()))
}

/// Merges partial sums by partition and derives CNT from the totals.
fn aggregate(files: &[PartialFile], cfg: &CiConfig) -> AggregateOutput {
    let mut merged: BTreeMap<GroupKey, (usize, Sl1l2Info)> = BTreeMap::new();
    for file in files {
        for p in &file.partitions {
            let key = GroupKey {
                fcst_var: file.fcst_var.clone(),
                obs_var: file.obs_var.clone(),
                msg_typ: p.msg_typ.clone(),
                mask: p.mask.clone(),
                interp_mthd: p.interp_mthd.clone(),
                interp_pnts: p.interp_pnts,
            };
            let entry = merged.entry(key).or_default();
            entry.0 += 1;
            entry.1 += &p.sl1l2;
        }
    }

    let groups = merged
        .into_iter()
        .map(|(key, (n_cases, sl1l2))| {
            let cnt = compute_cnt_from_sl1l2(&sl1l2, false, cfg);
            let anom_cnt = (sl1l2.sacount > 0).then(|| compute_cnt_from_sl1l2(&sl1l2, true, cfg));
            AggregateGroup {
                key,
                n_cases,
                sl1l2,
                cnt,
                anom_cnt,
            }
        })
        .collect();
    AggregateOutput {
        n_files: files.len(),
        groups,
    }
}

/// Run the aggregation over every input file.
pub fn run(args: AggregateArgs) -> Result<()> {
    let _cmd = info_span!("aggregate").entered();
    // 1. Validate CI settings
    let cfg = CiConfig::new().with_alphas(args.alphas.clone());
    cfg.validate().context("invalid --alpha")?;

    // 2. Read every partial file
    let files = args
        .inputs
        .iter()
        .map(|p| read_partial(p))
        .collect::<Result<Vec<_>>>()?;
    let n_partitions: usize = files.iter().map(|f| f.partitions.len()).sum();
    if n_partitions == 0 {
        bail!("no partitions found in {} input file(s)", files.len());
    }
    info!(n_files = files.len(), n_partitions, "partial sums loaded");

    // 3. Merge and derive statistics
    let output = aggregate(&files, &cfg);
    info!(n_groups = output.groups.len(), "aggregation complete");

    // 4. Write JSON
    let json = to_json(&output).context("failed to serialize aggregate")?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("failed to write aggregate: {}", path.display()))?;
            info!(path = %path.display(), "aggregate written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn partition(mask: &str, scount: usize, fbar: f64, obar: f64) -> PartialPartition {
        PartialPartition {
            msg_typ: "ADPSFC".into(),
            mask: mask.into(),
            interp_mthd: "NEAREST".into(),
            interp_pnts: 1,
            sl1l2: Sl1l2Info {
                scount,
                fbar,
                obar,
                fobar: fbar * obar,
                ffbar: fbar * fbar + 1.0,
                oobar: obar * obar + 1.0,
                mae: (fbar - obar).abs(),
                ..Sl1l2Info::default()
            },
        }
    }

    fn file(partitions: Vec<PartialPartition>) -> PartialFile {
        PartialFile {
            fcst_var: "TMP".into(),
            obs_var: "TMP".into(),
            partitions,
        }
    }

    #[test]
    fn test_groups_merge_by_partition() {
        let files = vec![
            file(vec![partition("FULL", 10, 1.0, 0.0), partition("EAST", 5, 2.0, 2.0)]),
            file(vec![partition("FULL", 30, 3.0, 1.0)]),
        ];
        let out = aggregate(&files, &CiConfig::default());
        assert_eq!(out.n_files, 2);
        assert_eq!(out.groups.len(), 2);

        let full = out.groups.iter().find(|g| g.key.mask == "FULL").unwrap();
        assert_eq!(full.n_cases, 2);
        assert_eq!(full.sl1l2.scount, 40);
        assert_relative_eq!(full.sl1l2.fbar, 2.5);
        assert_relative_eq!(full.cnt.me.v, 2.5 - 0.75);
        assert_eq!(full.cnt.n, 40);
        assert!(full.anom_cnt.is_none());
    }

    #[test]
    fn test_reads_verify_output_ignoring_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let sl1l2 = serde_json::to_value(Sl1l2Info::default()).unwrap();
        let doc = serde_json::json!({
            "fcst_var": "TMP",
            "obs_var": "TMP",
            "fcst_time": 0,
            "partitions": [{
                "msg_typ": "ADPSFC",
                "mask": "FULL",
                "interp_mthd": "NEAREST",
                "interp_pnts": 1,
                "n_pairs": 0,
                "sl1l2": sl1l2,
                "cts": []
            }]
        });
        std::fs::write(&path, doc.to_string()).unwrap();
        let parsed = read_partial(&path).unwrap();
        assert_eq!(parsed.partitions.len(), 1);
        assert_eq!(parsed.partitions[0].sl1l2.scount, 0);
        assert!(parsed.partitions[0].sl1l2.fbar.is_nan());
    }
}
