//! 2x2 contingency tables and categorical statistics (CTC/CTS).

use serde::Serialize;
use verif_pairs::{PairStore, SingleThresh};
use verif_stats::{BAD, is_bad, lambert_w0};

use crate::ci::{
    CiInfo, compute_hk_ci, compute_normal_ci, compute_proportion_ci, compute_woolf_ci,
    impl_ci_fields,
};
use crate::config::CiConfig;
use crate::error::EvaluateError;

/// Counts of a 2x2 forecast/observation contingency table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CtsTable {
    pub fy_oy: f64,
    pub fy_on: f64,
    pub fn_oy: f64,
    pub fn_on: f64,
}

impl CtsTable {
    pub fn new(fy_oy: f64, fy_on: f64, fn_oy: f64, fn_on: f64) -> Self {
        Self {
            fy_oy,
            fy_on,
            fn_oy,
            fn_on,
        }
    }

    /// Adds one pair to the cell selected by the two event flags.
    pub fn add(&mut self, f_event: bool, o_event: bool) {
        match (f_event, o_event) {
            (true, true) => self.fy_oy += 1.0,
            (true, false) => self.fy_on += 1.0,
            (false, true) => self.fn_oy += 1.0,
            (false, false) => self.fn_on += 1.0,
        }
    }

    pub fn n(&self) -> f64 {
        self.fy_oy + self.fy_on + self.fn_oy + self.fn_on
    }

    pub fn fy(&self) -> f64 {
        self.fy_oy + self.fy_on
    }

    pub fn fn_(&self) -> f64 {
        self.fn_oy + self.fn_on
    }

    pub fn oy(&self) -> f64 {
        self.fy_oy + self.fn_oy
    }

    pub fn on(&self) -> f64 {
        self.fy_on + self.fn_on
    }

    pub fn baser(&self) -> f64 {
        compute_proportion(self.oy(), self.n())
    }

    pub fn fmean(&self) -> f64 {
        compute_proportion(self.fy(), self.n())
    }

    pub fn accuracy(&self) -> f64 {
        compute_proportion(self.fy_oy + self.fn_on, self.n())
    }

    pub fn fbias(&self) -> f64 {
        compute_proportion(self.fy(), self.oy())
    }

    /// Probability of detection (hit rate).
    pub fn pody(&self) -> f64 {
        compute_proportion(self.fy_oy, self.oy())
    }

    pub fn podn(&self) -> f64 {
        compute_proportion(self.fn_on, self.on())
    }

    /// Probability of false detection (false alarm rate).
    pub fn pofd(&self) -> f64 {
        compute_proportion(self.fy_on, self.on())
    }

    pub fn far(&self) -> f64 {
        compute_proportion(self.fy_on, self.fy())
    }

    pub fn csi(&self) -> f64 {
        compute_proportion(self.fy_oy, self.n() - self.fn_on)
    }

    /// Gilbert skill score (equitable threat score).
    pub fn gss(&self) -> f64 {
        let n = self.n();
        if n == 0.0 {
            return BAD;
        }
        let c = self.fy() * self.oy() / n;
        finite((self.fy_oy - c) / (self.fy_oy + self.fy_on + self.fn_oy - c))
    }

    /// Frequency-bias-adjusted Gilbert skill score.
    pub fn bagss(&self) -> f64 {
        let (n, oy) = (self.n(), self.oy());
        let (b, c) = (self.fy_on, self.fn_oy);
        if n == 0.0 || oy == 0.0 || b == 0.0 || c == 0.0 {
            return BAD;
        }
        let lf = (oy / c).ln();
        let lw = lambert_w0(oy / b * lf);
        let ha = oy - (b / lf) * lw;
        let ec = oy * oy / n;
        finite((ha - ec) / (2.0 * oy - ha - ec))
    }

    /// Hanssen-Kuipers discriminant.
    pub fn hk(&self) -> f64 {
        let (a, b, c, d) = self.cells();
        finite((a * d - b * c) / ((a + c) * (b + d)))
    }

    /// Heidke skill score.
    pub fn hss(&self) -> f64 {
        let (a, b, c, d) = self.cells();
        finite(2.0 * (a * d - b * c) / ((a + c) * (c + d) + (a + b) * (b + d)))
    }

    /// Heidke skill score against an expected-correct fraction `ec`.
    pub fn hss_ec(&self, ec: f64) -> f64 {
        let n = self.n();
        finite((self.fy_oy + self.fn_on - n * ec) / (n - n * ec))
    }

    pub fn odds(&self) -> f64 {
        let (py, pn) = (self.pody(), self.pofd());
        if is_bad(py) || is_bad(pn) || py == 1.0 || pn == 1.0 {
            return BAD;
        }
        finite((py / (1.0 - py)) / (pn / (1.0 - pn)))
    }

    pub fn lodds(&self) -> f64 {
        let (a, b, c, d) = self.cells();
        if [a, b, c, d].iter().any(|v| *v == 0.0) {
            return BAD;
        }
        a.ln() + d.ln() - b.ln() - c.ln()
    }

    /// Variance of the log odds ratio.
    pub fn slor2(&self) -> f64 {
        let (a, b, c, d) = self.cells();
        if [a, b, c, d].iter().any(|v| *v == 0.0) {
            return BAD;
        }
        1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d
    }

    /// Odds ratio skill score.
    pub fn orss(&self) -> f64 {
        let (a, b, c, d) = self.cells();
        finite((a * d - b * c) / (a * d + b * c))
    }

    /// Extreme dependency score.
    pub fn eds(&self) -> f64 {
        let n = self.n();
        let (a, c) = (self.fy_oy, self.fn_oy);
        if n == 0.0 || a == 0.0 {
            return BAD;
        }
        finite(2.0 * ((a + c) / n).ln() / (a / n).ln() - 1.0)
    }

    /// Symmetric extreme dependency score.
    pub fn seds(&self) -> f64 {
        let n = self.n();
        let (a, b, c) = (self.fy_oy, self.fy_on, self.fn_oy);
        if n == 0.0 || a == 0.0 {
            return BAD;
        }
        finite((((a + b) / n).ln() + ((a + c) / n).ln()) / (a / n).ln() - 1.0)
    }

    /// Extremal dependence index.
    pub fn edi(&self) -> f64 {
        let (f, h) = (self.pofd(), self.pody());
        finite((f.ln() - h.ln()) / (f.ln() + h.ln()))
    }

    /// Symmetric extremal dependence index.
    pub fn sedi(&self) -> f64 {
        let (f, h) = (self.pofd(), self.pody());
        let num = f.ln() - h.ln() - (1.0 - f).ln() + (1.0 - h).ln();
        let den = f.ln() + h.ln() + (1.0 - f).ln() + (1.0 - h).ln();
        finite(num / den)
    }

    fn cells(&self) -> (f64, f64, f64, f64) {
        (self.fy_oy, self.fy_on, self.fn_oy, self.fn_on)
    }
}

/// `num / den`, or bad data for a bad value or a zero denominator.
pub fn compute_proportion(num: f64, den: f64) -> f64 {
    if is_bad(num) || is_bad(den) || den == 0.0 {
        BAD
    } else {
        num / den
    }
}

fn finite(v: f64) -> f64 {
    if is_bad(v) { BAD } else { v }
}

/// Categorical statistics derived from a [`CtsTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CtsInfo {
    pub cts: CtsTable,
    /// Expected-correct fraction for HSS_EC.
    pub ec_value: f64,

    pub baser: CiInfo,
    pub fmean: CiInfo,
    pub acc: CiInfo,
    pub fbias: CiInfo,
    pub pody: CiInfo,
    pub podn: CiInfo,
    pub pofd: CiInfo,
    pub far: CiInfo,
    pub csi: CiInfo,
    pub gss: CiInfo,
    pub bagss: CiInfo,
    pub hk: CiInfo,
    pub hss: CiInfo,
    pub hss_ec: CiInfo,
    pub odds: CiInfo,
    pub lodds: CiInfo,
    pub orss: CiInfo,
    pub eds: CiInfo,
    pub seds: CiInfo,
    pub edi: CiInfo,
    pub sedi: CiInfo,
}

impl_ci_fields!(CtsInfo {
    baser, fmean, acc, fbias, pody, podn, pofd, far, csi, gss, bagss, hk, hss, hss_ec, odds,
    lodds, orss, eds, seds, edi, sedi,
});

impl CtsInfo {
    pub fn new(n_alpha: usize) -> Self {
        let ci = CiInfo::new(n_alpha);
        Self {
            cts: CtsTable::default(),
            ec_value: 0.5,
            baser: ci.clone(),
            fmean: ci.clone(),
            acc: ci.clone(),
            fbias: ci.clone(),
            pody: ci.clone(),
            podn: ci.clone(),
            pofd: ci.clone(),
            far: ci.clone(),
            csi: ci.clone(),
            gss: ci.clone(),
            bagss: ci.clone(),
            hk: ci.clone(),
            hss: ci.clone(),
            hss_ec: ci.clone(),
            odds: ci.clone(),
            lodds: ci.clone(),
            orss: ci.clone(),
            eds: ci.clone(),
            seds: ci.clone(),
            edi: ci.clone(),
            sedi: ci,
        }
    }

    /// Statistics for an existing table.
    pub fn from_table(cts: CtsTable, n_alpha: usize) -> Self {
        let mut info = Self::new(n_alpha);
        info.cts = cts;
        info.compute_stats();
        info
    }

    /// Recomputes every statistic from the table.
    pub fn compute_stats(&mut self) {
        let t = self.cts;
        self.baser.v = t.baser();
        self.fmean.v = t.fmean();
        self.acc.v = t.accuracy();
        self.fbias.v = t.fbias();
        self.pody.v = t.pody();
        self.podn.v = t.podn();
        self.pofd.v = t.pofd();
        self.far.v = t.far();
        self.csi.v = t.csi();
        self.gss.v = t.gss();
        self.bagss.v = t.bagss();
        self.hk.v = t.hk();
        self.hss.v = t.hss();
        self.hss_ec.v = t.hss_ec(self.ec_value);
        self.odds.v = t.odds();
        self.lodds.v = t.lodds();
        self.orss.v = t.orss();
        self.eds.v = t.eds();
        self.seds.v = t.seds();
        self.edi.v = t.edi();
        self.sedi.v = t.sedi();
    }

    /// Normal confidence intervals for every alpha in `cfg`: Wilson
    /// intervals on the proportions, the HK and Woolf intervals, and
    /// normal approximations on the log odds and dependency scores.
    pub fn compute_ci(&mut self, cfg: &CiConfig) {
        let t = self.cts;
        let n = t.n();
        let (a, b, c, d) = t.cells();
        for (i, &alpha) in cfg.alphas().iter().enumerate() {
            for stat in [
                &mut self.baser,
                &mut self.fmean,
                &mut self.acc,
                &mut self.pody,
                &mut self.podn,
                &mut self.pofd,
                &mut self.far,
                &mut self.csi,
            ] {
                let ci = compute_proportion_ci(stat.v, n, alpha, stat.vif);
                stat.set_normal(i, ci);
            }

            let ci = compute_hk_ci(self.hk.v, alpha, self.hk.vif, a, b, c, d);
            self.hk.set_normal(i, ci);
            let ci = compute_woolf_ci(self.odds.v, alpha, a, b, c, d);
            self.odds.set_normal(i, ci);

            let slor2 = t.slor2();
            let ci = compute_normal_ci(self.lodds.v, alpha, slor2.sqrt());
            self.lodds.set_normal(i, ci);

            let odds = self.odds.v;
            let se = (slor2 * 4.0 * odds * odds / (odds + 1.0).powi(4)).sqrt();
            let ci = compute_normal_ci(self.orss.v, alpha, se);
            self.orss.set_normal(i, ci);

            let (h, br, f) = (self.pody.v, self.baser.v, self.pofd.v);
            let spread = (h * (1.0 - h) / (br * n)).sqrt();

            let se = 2.0 * br.ln().abs() / (h * (br.ln() + h.ln()).powi(2)) * spread;
            let ci = compute_normal_ci(self.eds.v, alpha, se);
            self.eds.set_normal(i, ci);

            let se = spread * (-(self.fbias.v * br * br).ln() / (h * (h * br).ln().powi(2)));
            let ci = compute_normal_ci(self.seds.v, alpha, se);
            self.seds.set_normal(i, ci);

            let se = 2.0 * (f.ln() + h / (1.0 - h) * h.ln()).abs()
                / (h * (f.ln() + h.ln()).powi(2))
                * spread;
            let ci = compute_normal_ci(self.edi.v, alpha, se);
            self.edi.set_normal(i, ci);

            let lfh = (f * (1.0 - h)).ln();
            let lhf = (h * (1.0 - f)).ln();
            let se = 2.0
                * (((1.0 - h) * (1.0 - f) + h * f) / ((1.0 - h) * (1.0 - f)) * lfh
                    + 2.0 * h / (1.0 - h) * lhf)
                    .abs()
                / (h * (lfh + lhf).powi(2))
                * spread;
            let ci = compute_normal_ci(self.sedi.v, alpha, se);
            self.sedi.set_normal(i, ci);
        }
    }
}

/// Builds the contingency table from the pairs at `indices`.
///
/// Pairs with a bad forecast or observation are skipped.
pub(crate) fn cts_table_from_indices(
    pd: &PairStore,
    indices: &[usize],
    ft: &SingleThresh,
    ot: &SingleThresh,
) -> CtsTable {
    let (f, o) = (pd.f(), pd.o());
    let mut table = CtsTable::default();
    for &i in indices {
        if is_bad(f[i]) || is_bad(o[i]) {
            continue;
        }
        let climo = pd.climo(i);
        table.add(ft.check_climo(f[i], &climo), ot.check_climo(o[i], &climo));
    }
    table
}

/// Computes the 2x2 table and categorical statistics for every pair.
#[tracing::instrument(skip(pd, cfg), fields(n_pairs = pd.n_obs(), fcst_thresh = %ft, obs_thresh = %ot))]
pub fn compute_ctsinfo(
    pd: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    normal_ci: bool,
    cfg: &CiConfig,
) -> Result<CtsInfo, EvaluateError> {
    cfg.validate()?;
    let indices: Vec<usize> = (0..pd.n_obs()).collect();
    let mut info = CtsInfo::from_table(
        cts_table_from_indices(pd, &indices, ft, ot),
        cfg.alphas().len(),
    );
    if normal_ci {
        info.compute_ci(cfg);
    }
    Ok(info)
}

/// Categorical statistics over every pair except `skip`.
pub fn compute_i_ctsinfo(
    pd: &PairStore,
    skip: usize,
    ft: &SingleThresh,
    ot: &SingleThresh,
    cfg: &CiConfig,
) -> Result<CtsInfo, EvaluateError> {
    let n = pd.n_obs();
    if skip >= n {
        return Err(EvaluateError::IndexOutOfRange {
            context: "compute_i_ctsinfo",
            index: skip,
            n,
        });
    }
    let indices: Vec<usize> = (0..n).filter(|&i| i != skip).collect();
    Ok(CtsInfo::from_table(
        cts_table_from_indices(pd, &indices, ft, ot),
        cfg.alphas().len(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use verif_pairs::ClimoPntInfo;

    fn table() -> CtsTable {
        CtsTable::new(50.0, 20.0, 10.0, 120.0)
    }

    #[test]
    fn test_basic_rates() {
        let info = CtsInfo::from_table(table(), 1);
        assert_relative_eq!(info.baser.v, 0.3);
        assert_relative_eq!(info.fmean.v, 0.35);
        assert_relative_eq!(info.acc.v, 0.85);
        assert_relative_eq!(info.fbias.v, 70.0 / 60.0);
        assert_relative_eq!(info.pody.v, 50.0 / 60.0);
        assert_relative_eq!(info.podn.v, 120.0 / 140.0);
        assert_relative_eq!(info.pofd.v, 20.0 / 140.0);
        assert_relative_eq!(info.far.v, 20.0 / 70.0);
        assert_relative_eq!(info.csi.v, 0.625);
    }

    #[test]
    fn test_skill_scores() {
        let info = CtsInfo::from_table(table(), 1);
        assert_relative_eq!(info.gss.v, 29.0 / 59.0, epsilon = 1e-12);
        assert_relative_eq!(info.hk.v, 5800.0 / 8400.0, epsilon = 1e-12);
        assert_relative_eq!(info.hss.v, 11600.0 / 17600.0, epsilon = 1e-12);
        assert_relative_eq!(info.hss_ec.v, 0.7, epsilon = 1e-12);
        assert_relative_eq!(info.odds.v, 30.0, epsilon = 1e-9);
        assert_relative_eq!(info.lodds.v, 30.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(info.orss.v, 29.0 / 31.0, epsilon = 1e-12);
        assert!(!is_bad(info.bagss.v));
        assert!(info.bagss.v < 1.0);
    }

    #[test]
    fn test_dependency_scores() {
        let info = CtsInfo::from_table(table(), 1);
        let expected_eds = 2.0 * 0.3_f64.ln() / 0.25_f64.ln() - 1.0;
        assert_relative_eq!(info.eds.v, expected_eds, epsilon = 1e-12);
        let expected_seds = (0.35_f64.ln() + 0.3_f64.ln()) / 0.25_f64.ln() - 1.0;
        assert_relative_eq!(info.seds.v, expected_seds, epsilon = 1e-12);
        let (f, h) = (20.0_f64 / 140.0, 50.0_f64 / 60.0);
        assert_relative_eq!(
            info.edi.v,
            (f.ln() - h.ln()) / (f.ln() + h.ln()),
            epsilon = 1e-12
        );
        assert!(info.sedi.v > 0.0 && info.sedi.v < 1.0);
    }

    #[test]
    fn test_zero_cells_give_bad_data() {
        let info = CtsInfo::from_table(CtsTable::new(10.0, 0.0, 0.0, 10.0), 1);
        assert_relative_eq!(info.acc.v, 1.0);
        assert!(is_bad(info.lodds.v));
        assert!(is_bad(info.bagss.v));
        assert!(is_bad(info.far.v) || info.far.v == 0.0);
        let empty = CtsInfo::from_table(CtsTable::default(), 1);
        assert!(is_bad(empty.baser.v));
        assert!(is_bad(empty.gss.v));
    }

    #[test]
    fn test_confidence_intervals() {
        let mut info = CtsInfo::from_table(table(), 1);
        info.compute_ci(&CiConfig::default());
        for (name, ci) in crate::ci::CiFields::ci_fields(&info) {
            if is_bad(ci.ncl[0]) {
                continue;
            }
            assert!(
                ci.ncl[0] <= ci.v && ci.v <= ci.ncu[0],
                "{name}: {} not in [{}, {}]",
                ci.v,
                ci.ncl[0],
                ci.ncu[0]
            );
        }
        assert!(!is_bad(info.pody.ncl[0]));
        assert!(!is_bad(info.odds.ncl[0]));
        assert!(!is_bad(info.lodds.ncu[0]));
        assert!(!is_bad(info.hk.ncl[0]));
    }

    #[test]
    fn test_table_from_pairs_and_jackknife() {
        let mut pd = PairStore::new();
        let f = [1.0, 6.0, 7.0, 2.0, 8.0];
        let o = [0.0, 9.0, 1.0, 6.0, 7.0];
        pd.add_grid_pairs(&f, &o, &[ClimoPntInfo::default(); 5], &[1.0; 5])
            .unwrap();
        let t: SingleThresh = ">=5".parse().unwrap();
        let cfg = CiConfig::default();
        let info = compute_ctsinfo(&pd, &t, &t, false, &cfg).unwrap();
        assert_eq!(info.cts, CtsTable::new(2.0, 1.0, 1.0, 1.0));

        let info = compute_i_ctsinfo(&pd, 2, &t, &t, &cfg).unwrap();
        assert_eq!(info.cts, CtsTable::new(2.0, 0.0, 1.0, 1.0));
        assert!(matches!(
            compute_i_ctsinfo(&pd, 5, &t, &t, &cfg),
            Err(EvaluateError::IndexOutOfRange { .. })
        ));
    }
}
