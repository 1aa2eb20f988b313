//! Verify command: pair one case and compute statistics per partition.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span, info, info_span, warn};

use verif_evaluate::{
    CiConfig, CntInfo, CntOptions, CtsInfo, Sl1l2Info, compute_cnt_stats_ci_perc,
    compute_cntinfo, compute_ctsinfo, compute_cts_stats_ci_perc, to_json,
};
use verif_pairs::{
    PairStore, PartitionKey, PartitionRejects, RejectCounts, VxPairs, VxTask,
    subset_pairs_cnt_thresh,
};

use crate::case::read_case;
use crate::cli::VerifyArgs;
use crate::config::TaskConfig;
use crate::convert::{self, CatThresholds};

/// Statistics JSON written by `verify` and read back by `aggregate`.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub fcst_var: String,
    pub obs_var: String,
    pub fcst_time: i64,
    /// Observations read from the case.
    pub n_obs: usize,
    /// Observations paired in at least one partition.
    pub n_kept: usize,
    pub counts: RejectCounts,
    pub partitions: Vec<PartitionOutput>,
}

#[derive(Debug, Serialize)]
pub struct PartitionOutput {
    pub msg_typ: String,
    pub mask: String,
    pub interp_mthd: String,
    pub interp_pnts: usize,
    pub n_pairs: usize,
    pub rejects: PartitionRejects,
    pub sl1l2: Sl1l2Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnt: Option<CntInfo>,
    pub cts: Vec<CtsOutput>,
}

#[derive(Debug, Serialize)]
pub struct CtsOutput {
    pub fcst_thresh: String,
    pub obs_thresh: String,
    pub stats: CtsInfo,
}

/// Statistics settings shared by every partition.
struct StatsSettings {
    cat: CatThresholds,
    ci: CiConfig,
    cnt_opts: CntOptions,
}

/// One partition's labels and pairs, detached from the matrix.
struct PartitionJob<'a> {
    key: PartitionKey,
    msg_typ: String,
    mask: String,
    interp_mthd: String,
    interp_pnts: usize,
    rejects: PartitionRejects,
    store: &'a PairStore,
}

/// Run the pairing and statistics pipeline for one case.
pub fn run(args: VerifyArgs) -> Result<()> {
    let _cmd = info_span!("verify").entered();
    // 1. Load task TOML
    let toml_str = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config file: {}", args.config.display()))?;
    let task: TaskConfig = toml::from_str(&toml_str).context("failed to parse TOML config")?;

    // 2. Read the case
    let case = read_case(&args.case)?;
    let grid = case.grid()?;
    let fcst = case.fcst_planes()?;
    let fcmn = case.optional_planes(&case.fcst_climo_mean, "fcst_climo_mean")?;
    let fcsd = case.optional_planes(&case.fcst_climo_stdev, "fcst_climo_stdev")?;
    let ocmn = case.optional_planes(&case.obs_climo_mean, "obs_climo_mean")?;
    let ocsd = case.optional_planes(&case.obs_climo_stdev, "obs_climo_stdev")?;
    info!(
        n_obs = case.observations.len(),
        nx = case.grid.nx,
        ny = case.grid.ny,
        "case loaded"
    );

    // 3. Build library configs from TOML
    let fcst_info = convert::build_field_info(&task.fcst).context("invalid [fcst] section")?;
    let obs_info = convert::build_field_info(&task.obs).context("invalid [obs] section")?;
    let pairs_cfg = convert::build_pairs_config(&task.pairs, case.fcst_time)?;
    let msg_typs = convert::build_msg_typs(&task.pairs)?;
    let interps = convert::build_interps(&task.interp)?;
    let mask_defs = convert::build_masks(&task.mask)?;
    let settings = StatsSettings {
        cat: convert::build_cat_thresholds(&task.cat)?,
        ci: convert::build_ci_config(&task.ci)?,
        cnt_opts: convert::build_cnt_options(&task.ci),
    };

    // 4. Assemble the task and partition matrix
    let mut vx_task = VxTask::new(&fcst_info, &obs_info, &grid, &fcst);
    match (&fcmn, &fcsd) {
        (Some(mean), stdev) => vx_task = vx_task.with_fcst_climo(mean, stdev.as_ref()),
        (None, Some(_)) => warn!("fcst_climo_stdev ignored without fcst_climo_mean"),
        (None, None) => {}
    }
    match (&ocmn, &ocsd) {
        (Some(mean), stdev) => vx_task = vx_task.with_obs_climo(mean, stdev.as_ref()),
        (None, Some(_)) => warn!("obs_climo_stdev ignored without obs_climo_mean"),
        (None, None) => {}
    }
    let masks = mask_defs.iter().map(|m| m.spec()).collect();
    let mut vx = VxPairs::with_partitions(vx_task, pairs_cfg, msg_typs, masks, interps)
        .context("failed to build partitions")?;

    // 5. Run every observation through the cascade
    let observations = case.observations();
    let mut n_kept = 0;
    for obs in &observations {
        let result = vx
            .add_point_obs(obs)
            .with_context(|| format!("failed to pair observation from station {}", obs.sid))?;
        if result.is_keep() {
            n_kept += 1;
        } else {
            debug!(sid = %obs.sid, ?result, "observation rejected");
        }
    }
    vx.log_duplicate_report();
    vx.calc_obs_summary();
    info!(n_obs = observations.len(), n_kept, "pairing complete");

    // 6. Compute statistics per partition
    let jobs = partition_jobs(&vx)?;
    let partitions = jobs
        .par_iter()
        .map(|job| compute_partition(job, &settings))
        .collect::<Result<Vec<_>>>()?;

    // 7. Write statistics JSON
    let output = VerifyOutput {
        fcst_var: task.fcst.name.clone(),
        obs_var: task.obs.name.clone(),
        fcst_time: case.fcst_time,
        n_obs: observations.len(),
        n_kept,
        counts: *vx.counts(),
        partitions,
    };
    let json = to_json(&output).context("failed to serialize statistics")?;
    match args.output.or(task.output.path) {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("failed to write statistics: {}", path.display()))?;
            info!(path = %path.display(), "statistics written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn partition_jobs<'a>(vx: &'a VxPairs<'_>) -> Result<Vec<PartitionJob<'a>>> {
    vx.iter()
        .map(|(key, store)| {
            let (msg_typ, mask, interp) = match (
                vx.msg_typ(key.i_msg_typ),
                vx.mask(key.i_mask),
                vx.interp(key.i_interp),
            ) {
                (Some(m), Some(k), Some(i)) => (m, k, i),
                _ => anyhow::bail!("partition {key:?} is not labelled"),
            };
            Ok(PartitionJob {
                key,
                msg_typ: msg_typ.name().to_string(),
                mask: mask.name().to_string(),
                interp_mthd: interp.method().to_string(),
                interp_pnts: interp.n_points(),
                rejects: vx.rejects(key.i_msg_typ, key.i_mask, key.i_interp)?,
                store,
            })
        })
        .collect()
}

/// Bootstrap seed of one partition, so results do not depend on the
/// order partitions run in.
fn partition_seed(seed: u64, key: &PartitionKey) -> u64 {
    let k = ((key.i_interp as u64) << 32) | ((key.i_mask as u64) << 16) | key.i_msg_typ as u64;
    seed.wrapping_add(k)
}

fn compute_partition(job: &PartitionJob<'_>, s: &StatsSettings) -> Result<PartitionOutput> {
    let _span = debug_span!(
        "partition",
        msg_typ = %job.msg_typ,
        mask = %job.mask,
        interp = %job.interp_mthd,
    )
    .entered();
    let cat = &s.cat;
    let bootstrap = s.ci.n_replicates() > 0;
    let mut rng = StdRng::seed_from_u64(partition_seed(s.ci.seed(), &job.key));

    let sub = subset_pairs_cnt_thresh(job.store, &cat.cnt_fcst, &cat.cnt_obs, cat.logic)?;
    let sl1l2 = Sl1l2Info::from_pairs(&sub);
    let cnt = if sub.is_empty() {
        None
    } else {
        let mut cnt = compute_cntinfo(&sub, s.cnt_opts, &s.ci)?;
        if bootstrap {
            compute_cnt_stats_ci_perc(&sub, s.cnt_opts, &mut cnt, &s.ci, &mut rng)?;
        }
        Some(cnt)
    };

    let mut cts = Vec::with_capacity(cat.cts.len());
    if !job.store.is_empty() {
        for (ft, ot) in &cat.cts {
            let mut stats = compute_ctsinfo(job.store, ft, ot, s.cnt_opts.normal_ci, &s.ci)?;
            if bootstrap {
                compute_cts_stats_ci_perc(job.store, ft, ot, &mut stats, &s.ci, &mut rng)?;
            }
            cts.push(CtsOutput {
                fcst_thresh: ft.to_string(),
                obs_thresh: ot.to_string(),
                stats,
            });
        }
    }
    debug!(n_pairs = job.store.n_obs(), n_cnt = sub.n_obs(), "partition statistics done");

    Ok(PartitionOutput {
        msg_typ: job.msg_typ.clone(),
        mask: job.mask.clone(),
        interp_mthd: job.interp_mthd.clone(),
        interp_pnts: job.interp_pnts,
        n_pairs: job.store.n_obs(),
        rejects: job.rejects,
        sl1l2,
        cnt,
        cts,
    })
}
