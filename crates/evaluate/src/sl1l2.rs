//! Scalar and vector partial sums (SL1L2, VL1L2).
//!
//! Partial sums are weighted means over one pair subset. Sums computed
//! from separate subsets merge with `+=`, weighting each side by its
//! count, so statistics can be aggregated without the raw pairs.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use verif_pairs::{
    PairStore, SetLogic, SingleThresh, set_climo_flag, subset_pairs_cnt_thresh, subset_wind_pairs,
};
use verif_stats::{
    BAD, angle_difference, compute_anom_corr_uncntr, compute_corr, compute_stdev,
    convert_u_v_to_wdir, convert_u_v_to_wind, is_bad,
};

use crate::cnt::CntInfo;
use crate::config::CiConfig;
use crate::error::EvaluateError;
use crate::output::bad_data;

/// Scalar partial sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sl1l2Info {
    pub scount: usize,
    #[serde(with = "bad_data")]
    pub fbar: f64,
    #[serde(with = "bad_data")]
    pub obar: f64,
    #[serde(with = "bad_data")]
    pub fobar: f64,
    #[serde(with = "bad_data")]
    pub ffbar: f64,
    #[serde(with = "bad_data")]
    pub oobar: f64,
    #[serde(with = "bad_data")]
    pub mae: f64,

    /// Number of pairs with climatology, used for the anomaly sums.
    pub sacount: usize,
    #[serde(with = "bad_data")]
    pub fabar: f64,
    #[serde(with = "bad_data")]
    pub oabar: f64,
    #[serde(with = "bad_data")]
    pub foabar: f64,
    #[serde(with = "bad_data")]
    pub ffabar: f64,
    #[serde(with = "bad_data")]
    pub ooabar: f64,
}

impl Default for Sl1l2Info {
    fn default() -> Self {
        Self {
            scount: 0,
            fbar: BAD,
            obar: BAD,
            fobar: BAD,
            ffbar: BAD,
            oobar: BAD,
            mae: BAD,
            sacount: 0,
            fabar: BAD,
            oabar: BAD,
            foabar: BAD,
            ffabar: BAD,
            ooabar: BAD,
        }
    }
}

impl Sl1l2Info {
    /// Partial sums over every valid pair in `pd`.
    ///
    /// Anomalies are taken against the forecast climatology mean when the
    /// store has one, and the observation climatology mean otherwise.
    pub fn from_pairs(pd: &PairStore) -> Self {
        let mut s = Self::default();
        let (f, o, w) = (pd.f(), pd.o(), pd.wgt());
        let ocmn = pd.ocmn();
        let fclimo = if set_climo_flag(f, pd.fcmn()) { pd.fcmn() } else { ocmn };
        let climo_flag = set_climo_flag(o, ocmn);

        let valid: Vec<usize> = (0..pd.n_obs())
            .filter(|&i| !is_bad(f[i]) && !is_bad(o[i]) && !is_bad(w[i]))
            .collect();
        if let Some(norm) = normalizer(&valid, w) {
            let (mut fbar, mut obar, mut fobar, mut ffbar, mut oobar, mut mae) =
                (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
            for &i in &valid {
                let wi = norm(i);
                fbar += wi * f[i];
                obar += wi * o[i];
                fobar += wi * f[i] * o[i];
                ffbar += wi * f[i] * f[i];
                oobar += wi * o[i] * o[i];
                mae += wi * (f[i] - o[i]).abs();
            }
            s.scount = valid.len();
            (s.fbar, s.obar, s.fobar, s.ffbar, s.oobar, s.mae) =
                (fbar, obar, fobar, ffbar, oobar, mae);
        }

        if !climo_flag {
            return s;
        }
        let anom: Vec<usize> = valid
            .iter()
            .copied()
            .filter(|&i| !is_bad(fclimo[i]) && !is_bad(ocmn[i]))
            .collect();
        if let Some(norm) = normalizer(&anom, w) {
            let (mut fa, mut oa, mut foa, mut ffa, mut ooa) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for &i in &anom {
                let wi = norm(i);
                let (a, b) = (f[i] - fclimo[i], o[i] - ocmn[i]);
                fa += wi * a;
                oa += wi * b;
                foa += wi * a * b;
                ffa += wi * a * a;
                ooa += wi * b * b;
            }
            s.sacount = anom.len();
            (s.fabar, s.oabar, s.foabar, s.ffabar, s.ooabar) = (fa, oa, foa, ffa, ooa);
        }
        s
    }
}

impl AddAssign<&Sl1l2Info> for Sl1l2Info {
    fn add_assign(&mut self, rhs: &Sl1l2Info) {
        let (n1, n2) = (self.scount, rhs.scount);
        self.fbar = wavg(self.fbar, n1, rhs.fbar, n2);
        self.obar = wavg(self.obar, n1, rhs.obar, n2);
        self.fobar = wavg(self.fobar, n1, rhs.fobar, n2);
        self.ffbar = wavg(self.ffbar, n1, rhs.ffbar, n2);
        self.oobar = wavg(self.oobar, n1, rhs.oobar, n2);
        self.mae = wavg(self.mae, n1, rhs.mae, n2);
        self.scount = n1 + n2;

        let (n1, n2) = (self.sacount, rhs.sacount);
        self.fabar = wavg(self.fabar, n1, rhs.fabar, n2);
        self.oabar = wavg(self.oabar, n1, rhs.oabar, n2);
        self.foabar = wavg(self.foabar, n1, rhs.foabar, n2);
        self.ffabar = wavg(self.ffabar, n1, rhs.ffabar, n2);
        self.ooabar = wavg(self.ooabar, n1, rhs.ooabar, n2);
        self.sacount = n1 + n2;
    }
}

/// Partial sums over the pairs of `pd` passing `ft`/`ot` under `logic`.
pub fn compute_sl1l2info(
    pd: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    logic: SetLogic,
) -> Result<Sl1l2Info, EvaluateError> {
    let sub = subset_pairs_cnt_thresh(pd, ft, ot, logic)?;
    Ok(Sl1l2Info::from_pairs(&sub))
}

/// Derives CNT statistics from partial sums.
///
/// With `anomaly` the anomaly sums are used and only the anomaly
/// correlation family is filled; otherwise the Pearson correlation is.
/// Rank statistics and error percentiles need raw pairs and stay bad.
pub fn compute_cnt_from_sl1l2(s: &Sl1l2Info, anomaly: bool, cfg: &CiConfig) -> CntInfo {
    let mut cnt = CntInfo::new(cfg.alphas().len());
    let (n, f, o, fo, ff, oo) = if anomaly {
        (s.sacount, s.fabar, s.oabar, s.foabar, s.ffabar, s.ooabar)
    } else {
        (s.scount, s.fbar, s.obar, s.fobar, s.ffbar, s.oobar)
    };
    if n == 0 {
        return cnt;
    }
    let nf = n as f64;
    cnt.n = n;
    cnt.fbar.v = f;
    cnt.obar.v = o;
    cnt.fstdev.v = compute_stdev(f * nf, ff * nf, n);
    cnt.ostdev.v = compute_stdev(o * nf, oo * nf, n);

    let corr = compute_corr(f * nf, o * nf, ff * nf, oo * nf, fo * nf, n);
    if anomaly {
        cnt.anom_corr.v = corr;
        cnt.rmsfa.v = ff.sqrt();
        cnt.rmsoa.v = oo.sqrt();
        cnt.anom_corr_uncntr.v = compute_anom_corr_uncntr(ff, oo, fo);
    } else {
        cnt.pr_corr.v = corr;
    }

    let mse = ff + oo - 2.0 * fo;
    cnt.me.v = f - o;
    cnt.me2.v = cnt.me.v * cnt.me.v;
    cnt.mae.v = s.mae;
    cnt.estdev.v = compute_stdev(cnt.me.v * nf, mse * nf, n);
    cnt.set_error_stats(mse);
    cnt.compute_ci(cfg);
    cnt
}

/// Vector partial sums over u/v wind pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vl1l2Info {
    pub vcount: usize,
    #[serde(with = "bad_data")]
    pub uf_bar: f64,
    #[serde(with = "bad_data")]
    pub vf_bar: f64,
    #[serde(with = "bad_data")]
    pub uo_bar: f64,
    #[serde(with = "bad_data")]
    pub vo_bar: f64,
    #[serde(with = "bad_data")]
    pub uvfo_bar: f64,
    #[serde(with = "bad_data")]
    pub uvff_bar: f64,
    #[serde(with = "bad_data")]
    pub uvoo_bar: f64,
    #[serde(with = "bad_data")]
    pub f_speed_bar: f64,
    #[serde(with = "bad_data")]
    pub o_speed_bar: f64,

    /// Number of pairs with a defined direction error.
    pub dcount: usize,
    #[serde(with = "bad_data")]
    pub dir_bar: f64,
    #[serde(with = "bad_data")]
    pub absdir_bar: f64,
    #[serde(with = "bad_data")]
    pub dir2_bar: f64,

    pub vacount: usize,
    #[serde(with = "bad_data")]
    pub ufa_bar: f64,
    #[serde(with = "bad_data")]
    pub vfa_bar: f64,
    #[serde(with = "bad_data")]
    pub uoa_bar: f64,
    #[serde(with = "bad_data")]
    pub voa_bar: f64,
    #[serde(with = "bad_data")]
    pub uvfoa_bar: f64,
    #[serde(with = "bad_data")]
    pub uvffa_bar: f64,
    #[serde(with = "bad_data")]
    pub uvooa_bar: f64,
    #[serde(with = "bad_data")]
    pub fa_speed_bar: f64,
    #[serde(with = "bad_data")]
    pub oa_speed_bar: f64,

    pub dacount: usize,
    #[serde(with = "bad_data")]
    pub dira_bar: f64,
    #[serde(with = "bad_data")]
    pub absdira_bar: f64,
    #[serde(with = "bad_data")]
    pub dira2_bar: f64,
}

impl Default for Vl1l2Info {
    fn default() -> Self {
        Self {
            vcount: 0,
            uf_bar: BAD,
            vf_bar: BAD,
            uo_bar: BAD,
            vo_bar: BAD,
            uvfo_bar: BAD,
            uvff_bar: BAD,
            uvoo_bar: BAD,
            f_speed_bar: BAD,
            o_speed_bar: BAD,
            dcount: 0,
            dir_bar: BAD,
            absdir_bar: BAD,
            dir2_bar: BAD,
            vacount: 0,
            ufa_bar: BAD,
            vfa_bar: BAD,
            uoa_bar: BAD,
            voa_bar: BAD,
            uvfoa_bar: BAD,
            uvffa_bar: BAD,
            uvooa_bar: BAD,
            fa_speed_bar: BAD,
            oa_speed_bar: BAD,
            dacount: 0,
            dira_bar: BAD,
            absdira_bar: BAD,
            dira2_bar: BAD,
        }
    }
}

/// One u/v pair: forecast and observation components.
#[derive(Debug, Clone, Copy)]
struct UvPair {
    uf: f64,
    vf: f64,
    uo: f64,
    vo: f64,
}

/// Weighted vector means over one set of pairs.
#[derive(Debug, Default)]
struct VectorSums {
    n: usize,
    uf: f64,
    vf: f64,
    uo: f64,
    vo: f64,
    uvfo: f64,
    uvff: f64,
    uvoo: f64,
    f_speed: f64,
    o_speed: f64,
}

impl VectorSums {
    fn from_pairs(pairs: &[(UvPair, f64)]) -> Option<Self> {
        let w_sum: f64 = pairs.iter().map(|(_, w)| w).sum();
        if pairs.is_empty() || w_sum <= 0.0 {
            return None;
        }
        let mut s = Self {
            n: pairs.len(),
            ..Default::default()
        };
        for (p, w) in pairs {
            let w = w / w_sum;
            s.uf += w * p.uf;
            s.vf += w * p.vf;
            s.uo += w * p.uo;
            s.vo += w * p.vo;
            s.uvfo += w * (p.uf * p.uo + p.vf * p.vo);
            s.uvff += w * (p.uf * p.uf + p.vf * p.vf);
            s.uvoo += w * (p.uo * p.uo + p.vo * p.vo);
            s.f_speed += w * convert_u_v_to_wind(p.uf, p.vf);
            s.o_speed += w * convert_u_v_to_wind(p.uo, p.vo);
        }
        Some(s)
    }
}

/// Weighted means of the signed, absolute and squared direction error.
#[derive(Debug, Default)]
struct DirSums {
    n: usize,
    dir: f64,
    absdir: f64,
    dir2: f64,
}

impl DirSums {
    /// Pairs where either vector is calm have no direction and are skipped.
    fn from_pairs(pairs: &[(UvPair, f64)]) -> Option<Self> {
        let errs: Vec<(f64, f64)> = pairs
            .iter()
            .filter(|(p, _)| {
                convert_u_v_to_wind(p.uf, p.vf) > 0.0 && convert_u_v_to_wind(p.uo, p.vo) > 0.0
            })
            .map(|(p, w)| {
                let d = angle_difference(
                    convert_u_v_to_wdir(p.uf, p.vf),
                    convert_u_v_to_wdir(p.uo, p.vo),
                );
                (d, *w)
            })
            .filter(|(d, _)| !is_bad(*d))
            .collect();
        let w_sum: f64 = errs.iter().map(|(_, w)| w).sum();
        if errs.is_empty() || w_sum <= 0.0 {
            return None;
        }
        let mut s = Self {
            n: errs.len(),
            ..Default::default()
        };
        for (d, w) in errs {
            let w = w / w_sum;
            s.dir += w * d;
            s.absdir += w * d.abs();
            s.dir2 += w * d * d;
        }
        Some(s)
    }
}

impl Vl1l2Info {
    /// Vector partial sums from the u and v component stores of the same
    /// pairs. Weights come from the u store.
    pub fn from_pairs(pd_u: &PairStore, pd_v: &PairStore) -> Result<Self, EvaluateError> {
        if pd_u.n_obs() != pd_v.n_obs() {
            return Err(EvaluateError::LengthMismatch {
                context: "Vl1l2Info::from_pairs",
                expected: pd_u.n_obs(),
                got: pd_v.n_obs(),
            });
        }
        let w = pd_u.wgt();
        let raw: Vec<(UvPair, f64)> = (0..pd_u.n_obs())
            .map(|i| {
                let p = UvPair {
                    uf: pd_u.f()[i],
                    vf: pd_v.f()[i],
                    uo: pd_u.o()[i],
                    vo: pd_v.o()[i],
                };
                (p, w[i])
            })
            .filter(|(p, w)| ![p.uf, p.vf, p.uo, p.vo, *w].iter().any(|v| is_bad(*v)))
            .collect();

        let mut out = Self::default();
        out.set_vector(VectorSums::from_pairs(&raw), false);
        out.set_dir(DirSums::from_pairs(&raw), false);

        let climo = |pd: &PairStore| {
            let f = if set_climo_flag(pd.f(), pd.fcmn()) { pd.fcmn() } else { pd.ocmn() };
            (f.to_vec(), pd.ocmn().to_vec())
        };
        if set_climo_flag(pd_u.o(), pd_u.ocmn()) && set_climo_flag(pd_v.o(), pd_v.ocmn()) {
            let (ufc, uoc) = climo(pd_u);
            let (vfc, voc) = climo(pd_v);
            let anom: Vec<(UvPair, f64)> = (0..pd_u.n_obs())
                .map(|i| {
                    let p = UvPair {
                        uf: pd_u.f()[i] - ufc[i],
                        vf: pd_v.f()[i] - vfc[i],
                        uo: pd_u.o()[i] - uoc[i],
                        vo: pd_v.o()[i] - voc[i],
                    };
                    (p, w[i])
                })
                .filter(|(p, w)| ![p.uf, p.vf, p.uo, p.vo, *w].iter().any(|v| is_bad(*v)))
                .collect();
            out.set_vector(VectorSums::from_pairs(&anom), true);
            out.set_dir(DirSums::from_pairs(&anom), true);
        }
        Ok(out)
    }

    fn set_vector(&mut self, s: Option<VectorSums>, anomaly: bool) {
        let Some(s) = s else { return };
        let vals = (s.n, s.uf, s.vf, s.uo, s.vo, s.uvfo, s.uvff, s.uvoo, s.f_speed, s.o_speed);
        if anomaly {
            (
                self.vacount,
                self.ufa_bar,
                self.vfa_bar,
                self.uoa_bar,
                self.voa_bar,
                self.uvfoa_bar,
                self.uvffa_bar,
                self.uvooa_bar,
                self.fa_speed_bar,
                self.oa_speed_bar,
            ) = vals;
        } else {
            (
                self.vcount,
                self.uf_bar,
                self.vf_bar,
                self.uo_bar,
                self.vo_bar,
                self.uvfo_bar,
                self.uvff_bar,
                self.uvoo_bar,
                self.f_speed_bar,
                self.o_speed_bar,
            ) = vals;
        }
    }

    fn set_dir(&mut self, s: Option<DirSums>, anomaly: bool) {
        let Some(s) = s else { return };
        if anomaly {
            (self.dacount, self.dira_bar, self.absdira_bar, self.dira2_bar) =
                (s.n, s.dir, s.absdir, s.dir2);
        } else {
            (self.dcount, self.dir_bar, self.absdir_bar, self.dir2_bar) =
                (s.n, s.dir, s.absdir, s.dir2);
        }
    }

    /// Statistics derived from the partial sums.
    pub fn stats(&self) -> Vl1l2Stats {
        let n = self.vcount;
        let nf = n as f64;
        let (uf, vf, uo, vo) = (self.uf_bar, self.vf_bar, self.uo_bar, self.vo_bar);
        let msve = self.uvff_bar - 2.0 * self.uvfo_bar + self.uvoo_bar;
        let fbar_speed = convert_u_v_to_wind(uf, vf);
        let obar_speed = convert_u_v_to_wind(uo, vo);
        let fdir = convert_u_v_to_wdir(uf, vf);
        let odir = convert_u_v_to_wdir(uo, vo);
        let speed_err = fbar_speed - obar_speed;
        let dir_err = angle_difference(fdir, odir);
        let sqrt = |v: f64| if v < 0.0 { BAD } else { v.sqrt() };
        let na = self.vacount;
        let naf = na as f64;
        Vl1l2Stats {
            fbar: self.f_speed_bar,
            obar: self.o_speed_bar,
            fs_rms: sqrt(self.uvff_bar),
            os_rms: sqrt(self.uvoo_bar),
            msve,
            rmsve: sqrt(msve),
            fstdev: compute_stdev(self.f_speed_bar * nf, self.uvff_bar * nf, n),
            ostdev: compute_stdev(self.o_speed_bar * nf, self.uvoo_bar * nf, n),
            fdir,
            odir,
            fbar_speed,
            obar_speed,
            vdiff_speed: convert_u_v_to_wind(uf - uo, vf - vo),
            vdiff_dir: convert_u_v_to_wdir(uf - uo, vf - vo),
            speed_err,
            speed_abserr: speed_err.abs(),
            dir_err,
            dir_abserr: dir_err.abs(),
            dir_me: self.dir_bar,
            dir_mae: self.absdir_bar,
            dir_mse: self.dir2_bar,
            dir_rmse: sqrt(self.dir2_bar),
            anom_corr: if na == 0 {
                BAD
            } else {
                compute_corr(
                    self.fa_speed_bar * naf,
                    self.oa_speed_bar * naf,
                    self.uvffa_bar * naf,
                    self.uvooa_bar * naf,
                    self.uvfoa_bar * naf,
                    na,
                )
            },
            anom_corr_uncntr: compute_anom_corr_uncntr(
                self.uvffa_bar,
                self.uvooa_bar,
                self.uvfoa_bar,
            ),
        }
    }
}

impl AddAssign<&Vl1l2Info> for Vl1l2Info {
    fn add_assign(&mut self, rhs: &Vl1l2Info) {
        let (n1, n2) = (self.vcount, rhs.vcount);
        for (a, b) in [
            (&mut self.uf_bar, rhs.uf_bar),
            (&mut self.vf_bar, rhs.vf_bar),
            (&mut self.uo_bar, rhs.uo_bar),
            (&mut self.vo_bar, rhs.vo_bar),
            (&mut self.uvfo_bar, rhs.uvfo_bar),
            (&mut self.uvff_bar, rhs.uvff_bar),
            (&mut self.uvoo_bar, rhs.uvoo_bar),
            (&mut self.f_speed_bar, rhs.f_speed_bar),
            (&mut self.o_speed_bar, rhs.o_speed_bar),
        ] {
            *a = wavg(*a, n1, b, n2);
        }
        self.vcount = n1 + n2;

        let (n1, n2) = (self.dcount, rhs.dcount);
        for (a, b) in [
            (&mut self.dir_bar, rhs.dir_bar),
            (&mut self.absdir_bar, rhs.absdir_bar),
            (&mut self.dir2_bar, rhs.dir2_bar),
        ] {
            *a = wavg(*a, n1, b, n2);
        }
        self.dcount = n1 + n2;

        let (n1, n2) = (self.vacount, rhs.vacount);
        for (a, b) in [
            (&mut self.ufa_bar, rhs.ufa_bar),
            (&mut self.vfa_bar, rhs.vfa_bar),
            (&mut self.uoa_bar, rhs.uoa_bar),
            (&mut self.voa_bar, rhs.voa_bar),
            (&mut self.uvfoa_bar, rhs.uvfoa_bar),
            (&mut self.uvffa_bar, rhs.uvffa_bar),
            (&mut self.uvooa_bar, rhs.uvooa_bar),
            (&mut self.fa_speed_bar, rhs.fa_speed_bar),
            (&mut self.oa_speed_bar, rhs.oa_speed_bar),
        ] {
            *a = wavg(*a, n1, b, n2);
        }
        self.vacount = n1 + n2;

        let (n1, n2) = (self.dacount, rhs.dacount);
        for (a, b) in [
            (&mut self.dira_bar, rhs.dira_bar),
            (&mut self.absdira_bar, rhs.absdira_bar),
            (&mut self.dira2_bar, rhs.dira2_bar),
        ] {
            *a = wavg(*a, n1, b, n2);
        }
        self.dacount = n1 + n2;
    }
}

/// Statistics derived from [`Vl1l2Info`]. Speeds are in the input units,
/// directions in degrees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vl1l2Stats {
    pub fbar: f64,
    pub obar: f64,
    pub fs_rms: f64,
    pub os_rms: f64,
    pub msve: f64,
    pub rmsve: f64,
    pub fstdev: f64,
    pub ostdev: f64,
    pub fdir: f64,
    pub odir: f64,
    pub fbar_speed: f64,
    pub obar_speed: f64,
    pub vdiff_speed: f64,
    pub vdiff_dir: f64,
    pub speed_err: f64,
    pub speed_abserr: f64,
    pub dir_err: f64,
    pub dir_abserr: f64,
    pub dir_me: f64,
    pub dir_mae: f64,
    pub dir_mse: f64,
    pub dir_rmse: f64,
    pub anom_corr: f64,
    pub anom_corr_uncntr: f64,
}

/// Vector partial sums over the pairs whose wind speeds pass `ft`/`ot`.
pub fn compute_vl1l2info(
    pd_u: &PairStore,
    pd_v: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    logic: SetLogic,
) -> Result<Vl1l2Info, EvaluateError> {
    let (sub_u, sub_v) = subset_wind_pairs(pd_u, pd_v, ft, ot, logic)?;
    Vl1l2Info::from_pairs(&sub_u, &sub_v)
}

/// Count-weighted average. An empty side contributes nothing.
fn wavg(a: f64, na: usize, b: f64, nb: usize) -> f64 {
    match (na, nb) {
        (_, 0) => a,
        (0, _) => b,
        _ => (a * na as f64 + b * nb as f64) / (na + nb) as f64,
    }
}

/// Weight normalizer over `idx`, or `None` when nothing can be weighted.
fn normalizer<'a>(idx: &[usize], w: &'a [f64]) -> Option<impl Fn(usize) -> f64 + 'a> {
    let w_sum: f64 = idx.iter().map(|&i| w[i]).sum();
    if idx.is_empty() || w_sum <= 0.0 {
        None
    } else {
        Some(move |i: usize| w[i] / w_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use verif_pairs::ClimoPntInfo;

    fn store(f: &[f64], o: &[f64], climo: ClimoPntInfo) -> PairStore {
        let mut pd = PairStore::new();
        pd.add_grid_pairs(f, o, &vec![climo; f.len()], &vec![1.0; f.len()])
            .unwrap();
        pd
    }

    #[test]
    fn test_sl1l2_sums() {
        let pd = store(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0], ClimoPntInfo::default());
        let s = Sl1l2Info::from_pairs(&pd);
        assert_eq!(s.scount, 3);
        assert_relative_eq!(s.fbar, 2.0, epsilon = 1e-12);
        assert_relative_eq!(s.obar, 7.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(s.fobar, 17.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(s.ffbar, 14.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(s.oobar, 7.0, epsilon = 1e-12);
        assert_relative_eq!(s.mae, 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(s.sacount, 0);
        assert!(is_bad(s.fabar));
    }

    #[test]
    fn test_cnt_from_sl1l2_matches_pairs() {
        let pd = store(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0], ClimoPntInfo::default());
        let cfg = CiConfig::default();
        let cnt = compute_cnt_from_sl1l2(&Sl1l2Info::from_pairs(&pd), false, &cfg);
        assert_eq!(cnt.n, 3);
        assert_relative_eq!(cnt.mse.v, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.me.v, -1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.rmse.v, (1.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert!(!is_bad(cnt.pr_corr.v));
        assert!(is_bad(cnt.anom_corr.v));
        assert!(is_bad(cnt.e50.v));
    }

    #[test]
    fn test_merge_equals_whole() {
        let f = [1.0, 2.0, 3.0, 5.0, 8.0];
        let o = [1.5, 2.0, 2.5, 6.0, 7.0];
        let climo = ClimoPntInfo::new(f64::NAN, f64::NAN, 4.0, 1.0);
        let whole = Sl1l2Info::from_pairs(&store(&f, &o, climo));
        let mut merged = Sl1l2Info::from_pairs(&store(&f[..2], &o[..2], climo));
        merged += &Sl1l2Info::from_pairs(&store(&f[2..], &o[2..], climo));
        assert_eq!(merged.scount, whole.scount);
        assert_eq!(merged.sacount, 5);
        assert_relative_eq!(merged.fobar, whole.fobar, epsilon = 1e-12);
        assert_relative_eq!(merged.mae, whole.mae, epsilon = 1e-12);
        assert_relative_eq!(merged.ooabar, whole.ooabar, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_with_empty() {
        let pd = store(&[1.0, 2.0], &[2.0, 2.0], ClimoPntInfo::default());
        let s = Sl1l2Info::from_pairs(&pd);
        let mut empty = Sl1l2Info::default();
        empty += &s;
        assert_eq!(empty.scount, 2);
        assert_eq!(empty.fbar, s.fbar);
        assert_eq!(empty.mae, s.mae);
        assert_eq!(empty.sacount, 0);
        assert!(is_bad(empty.fabar));
    }

    #[test]
    fn test_sl1l2_json_round_trip_keeps_bad_data() {
        let pd = store(&[1.0, 2.0], &[2.0, 2.0], ClimoPntInfo::default());
        let s = Sl1l2Info::from_pairs(&pd);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"fabar\":null"));
        let back: Sl1l2Info = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scount, 2);
        assert_eq!(back.fbar, s.fbar);
        assert!(is_bad(back.fabar));
    }

    #[test]
    fn test_threshold_subset() {
        let pd = store(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0], ClimoPntInfo::default());
        let t: SingleThresh = ">1.5".parse().unwrap();
        let s = compute_sl1l2info(&pd, &t, &t, SetLogic::Intersection).unwrap();
        assert_eq!(s.scount, 2);
        assert_relative_eq!(s.fbar, 2.5);
    }

    #[test]
    fn test_vl1l2_single_pair() {
        let pd_u = store(&[3.0], &[0.0], ClimoPntInfo::default());
        let pd_v = store(&[4.0], &[5.0], ClimoPntInfo::default());
        let v = Vl1l2Info::from_pairs(&pd_u, &pd_v).unwrap();
        assert_eq!(v.vcount, 1);
        assert_eq!(v.dcount, 1);
        let st = v.stats();
        assert_relative_eq!(st.fbar, 5.0);
        assert_relative_eq!(st.obar, 5.0);
        assert_relative_eq!(st.msve, 10.0, epsilon = 1e-12);
        assert_relative_eq!(st.rmsve, 10.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(st.speed_err, 0.0, epsilon = 1e-12);
        assert_relative_eq!(st.vdiff_speed, 10.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(st.dir_abserr, st.dir_mae, epsilon = 1e-9);
        assert!(is_bad(st.fstdev));
    }

    #[test]
    fn test_vl1l2_perfect_forecast() {
        let u = [1.0, -2.0, 0.5];
        let v = [0.0, 1.0, -3.0];
        let v = Vl1l2Info::from_pairs(
            &store(&u, &u, ClimoPntInfo::default()),
            &store(&v, &v, ClimoPntInfo::default()),
        )
        .unwrap();
        let st = v.stats();
        assert_relative_eq!(st.msve, 0.0, epsilon = 1e-12);
        assert_relative_eq!(st.dir_me, 0.0, epsilon = 1e-9);
        assert_relative_eq!(st.dir_err, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_vl1l2_calm_wind_has_no_direction() {
        let pd_u = store(&[0.0, 1.0], &[1.0, 1.0], ClimoPntInfo::default());
        let pd_v = store(&[0.0, 0.0], &[0.0, 0.0], ClimoPntInfo::default());
        let v = Vl1l2Info::from_pairs(&pd_u, &pd_v).unwrap();
        assert_eq!(v.vcount, 2);
        assert_eq!(v.dcount, 1);
    }

    #[test]
    fn test_vl1l2_merge() {
        let u = [1.0, 2.0, 3.0];
        let v = [1.0, 0.0, -1.0];
        let uo = [1.5, 2.0, 2.0];
        let vo = [0.5, 0.5, -1.0];
        let whole = Vl1l2Info::from_pairs(
            &store(&u, &uo, ClimoPntInfo::default()),
            &store(&v, &vo, ClimoPntInfo::default()),
        )
        .unwrap();
        let mut merged = Vl1l2Info::from_pairs(
            &store(&u[..1], &uo[..1], ClimoPntInfo::default()),
            &store(&v[..1], &vo[..1], ClimoPntInfo::default()),
        )
        .unwrap();
        merged += &Vl1l2Info::from_pairs(
            &store(&u[1..], &uo[1..], ClimoPntInfo::default()),
            &store(&v[1..], &vo[1..], ClimoPntInfo::default()),
        )
        .unwrap();
        assert_eq!(merged.vcount, 3);
        assert_relative_eq!(merged.uvfo_bar, whole.uvfo_bar, epsilon = 1e-12);
        assert_relative_eq!(merged.dir2_bar, whole.dir2_bar, epsilon = 1e-9);
    }

    #[test]
    fn test_vl1l2_length_mismatch() {
        let a = store(&[1.0], &[1.0], ClimoPntInfo::default());
        let b = store(&[1.0, 2.0], &[1.0, 2.0], ClimoPntInfo::default());
        assert!(matches!(
            Vl1l2Info::from_pairs(&a, &b),
            Err(EvaluateError::LengthMismatch { expected: 1, got: 2, .. })
        ));
    }
}
