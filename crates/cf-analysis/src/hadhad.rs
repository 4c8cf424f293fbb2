//! Di-hadronic tau channel selections and categories.

use std::f64::consts::E;

use cf_core::Result;
use cf_select::{Binning, Cut, OVERFLOW_SENTINEL};

use crate::category::{Category, CategoryRegistry, CategoryRegistryBuilder};
use crate::region::{BAD_MASS, MASS_BRANCH, Region};

/// Shared building-block selections.
#[derive(Debug, Clone)]
pub struct Selections {
    /// Leading tau passes medium ID.
    pub tau1_medium: Cut,
    /// Subleading tau passes medium ID.
    pub tau2_medium: Cut,
    /// Leading tau passes tight ID.
    pub tau1_tight: Cut,
    /// Subleading tau passes tight ID.
    pub tau2_tight: Cut,
    /// Both taus medium.
    pub id_medium: Cut,
    /// Both taus tight.
    pub id_tight: Cut,
    /// One medium, one tight.
    pub id_medium_tight: Cut,
    /// Preselection shared by every category.
    pub common: Cut,
    /// Missing transverse energy requirement.
    pub met: Cut,
    /// Z mass window.
    pub z_peak: Cut,
    /// Leading jet above 50 GeV.
    pub lead_jet_50: Cut,
    /// Subleading jet above 30 GeV.
    pub sublead_jet_30: Cut,
    /// Two-jet topology.
    pub vbf: Cut,
    /// One hard jet, no second jet.
    pub boosted: Cut,
    /// No hard jet.
    pub ggf: Cut,
}

impl Selections {
    /// Build the selections.
    pub fn new() -> Self {
        let tau1_medium = Cut::new("tau1_JetBDTSigMedium == 1");
        let tau2_medium = Cut::new("tau2_JetBDTSigMedium == 1");
        let tau1_tight = Cut::new("tau1_JetBDTSigTight == 1");
        let tau2_tight = Cut::new("tau2_JetBDTSigTight == 1");

        let id_medium = &tau1_medium & &tau2_medium;
        let id_tight = &tau1_tight & &tau2_tight;
        let id_medium_tight = (&tau1_medium & &tau2_tight) | (&tau1_tight & &tau2_medium);

        let met = Cut::new("MET > 20000");
        let common = Cut::all_of(&[
            Cut::new("tau1_pt > 35000"),
            Cut::new("tau2_pt > 25000"),
            met.clone(),
            Cut::new(format!("{MASS_BRANCH} > {BAD_MASS}")),
            Cut::new("dR_tau1_tau2 < 3.2"),
        ]);

        let lead_jet_50 = Cut::new("jet1_pt > 50000");
        let sublead_jet_30 = Cut::new("jet2_pt > 30000");
        let vbf = &lead_jet_50 & &sublead_jet_30;
        let boosted = lead_jet_50.and(&sublead_jet_30.negate());
        let ggf = lead_jet_50.negate();

        Self {
            tau1_medium,
            tau2_medium,
            tau1_tight,
            tau2_tight,
            id_medium,
            id_tight,
            id_medium_tight,
            common,
            met,
            z_peak: Cut::new(format!("80 < {MASS_BRANCH} < 120")),
            lead_jet_50,
            sublead_jet_30,
            vbf,
            boosted,
            ggf,
        }
    }

    fn with_years(&self, category: Category) -> Category {
        category
            .year_cut(2011, self.id_medium.clone())
            .year_cut(2012, self.id_medium_tight.clone())
    }
}

impl Default for Selections {
    fn default() -> Self {
        Self::new()
    }
}

const VBF_FEATURES: &[&str] = &[
    "dEta_jets",
    "eta_product_jets",
    "mass_jet1_jet2",
    "tau1_centrality",
    "tau2_centrality",
    "dR_tau1_tau2",
    "tau1_BDTJetScore",
    "tau2_BDTJetScore",
    "MET_centrality",
    "mmc_resonance_pt",
];

const BOOSTED_FEATURES: &[&str] = &[
    "sphericity",
    "dR_tau1_tau2",
    "tau1_BDTJetScore",
    "tau2_BDTJetScore",
    "tau1_x",
    "tau2_x",
    "MET_centrality",
    "mmc_resonance_pt",
];

const GGF_FEATURES: &[&str] = &[
    "dR_tau1_tau2",
    "tau1_BDTJetScore",
    "tau2_BDTJetScore",
    "tau1_x",
    "tau2_x",
    "MET_centrality",
    "mmc_resonance_pt",
];

const INF: f64 = OVERFLOW_SENTINEL;

fn vbf_mass_bins() -> Binning {
    Binning::Edges(vec![0.0, 64.0, 80.0, 92.0, 104.0, 116.0, 132.0, 152.0, 176.0, INF])
}

fn boosted_tight_mass_bins() -> Binning {
    let mut edges = vec![0.0, 64.0, 72.0, 80.0];
    edges.extend((84..=144).step_by(4).map(f64::from));
    edges.extend([152.0, 160.0, 168.0, 176.0, 184.0, 200.0, INF]);
    Binning::Edges(edges)
}

fn boosted_loose_mass_bins() -> Binning {
    let mut edges = vec![0.0, 72.0, 80.0];
    edges.extend((84..=144).step_by(4).map(f64::from));
    edges.extend([152.0, 176.0, 184.0, INF]);
    Binning::Edges(edges)
}

/// Registry with the `mva`, `controls` and `cuts` groups.
pub fn registry() -> Result<CategoryRegistry> {
    builder().build()
}

/// The hadhad categories, open for further definitions before building.
pub fn builder() -> CategoryRegistryBuilder {
    let s = Selections::new();
    let label = |text: &str| format!(r"$\tau_{{had}}\tau_{{had}}$: {text}");

    let vbf = s
        .with_years(Category::new("vbf", &s.vbf & &s.common))
        .label(label("VBF Category"))
        .features(VBF_FEATURES.iter().copied())
        .fit_bins(5)
        .limit_bins(12)
        .regions(Region::Ss, Region::Os);
    let boosted = s
        .with_years(Category::new("boosted", &s.boosted & &s.common))
        .label(label("Boosted Category"))
        .features(BOOSTED_FEATURES.iter().copied())
        .fit_bins(5)
        .limit_bins(12)
        .regions(Region::Ss, Region::Os);
    let ggf = s
        .with_years(Category::new("ggf", &s.ggf & &s.common))
        .label(label("Non-Boosted Category"))
        .features(GGF_FEATURES.iter().copied())
        .fit_bins(8)
        .limit_bins(13)
        .regions(Region::Ss, Region::Os);

    let preselection = s
        .with_years(Category::new("preselection", s.common.clone()))
        .label(label("At Preselection"))
        .fit_bins(10)
        .regions(Region::Ss, Region::Os);
    let z = s
        .with_years(Category::new(
            "z",
            Cut::all_of(&[s.met.clone(), Cut::new("dR_tau1_tau2 < 2.8"), s.z_peak.clone()]),
        ))
        .label(label("Z Control Region"))
        .fit_bins(8)
        .regions(Region::Ss, Region::Os);

    let mut builder = CategoryRegistry::builder()
        .category("mva", vbf)
        .category("mva", boosted)
        .category("mva", ggf)
        .category("controls", preselection)
        .category("controls", z);
    for c in cut_based(&s) {
        builder = builder.category("cuts", c);
    }
    builder
}

fn cut_based(s: &Selections) -> Vec<Category> {
    let taus_central = Cut::new(format!("tau1_centrality > {:.6}", 1.0 / E))
        & Cut::new(format!("tau2_centrality > {:.6}", 1.0 / E));
    let vbf_cb = Cut::all_of(&[
        s.vbf.clone(),
        Cut::new("dEta_jets > 2.6"),
        Cut::new("mass_jet1_jet2 > 250000"),
        taus_central,
    ]);
    let boosted_cb = Cut::new("resonance_pt > 100000");

    let low_dr = Cut::new("dR_tau1_tau2 < 1.5") & Cut::new("resonance_pt > 140000");
    let high_dr = Cut::new("dR_tau1_tau2 > 1.5") | Cut::new("resonance_pt < 140000");
    let mjj_line = "mass_jet1_jet2 > (-250000 * dEta_jets + 1550000)";
    let mjj_below = "mass_jet1_jet2 < (-250000 * dEta_jets + 1550000)";

    let vbf_lowdr = &vbf_cb & &low_dr;
    let vbf_highdr_tight = Cut::all_of(&[vbf_cb.clone(), high_dr.clone(), Cut::new(mjj_line)]);
    let vbf_highdr_loose = Cut::all_of(&[vbf_cb.clone(), high_dr.clone(), Cut::new(mjj_below)]);
    let not_vbf = !&vbf_cb;
    let boosted_tight = Cut::all_of(&[not_vbf.clone(), boosted_cb.clone(), low_dr]);
    let boosted_loose = Cut::all_of(&[not_vbf.clone(), boosted_cb.clone(), high_dr]);
    let boosted_nodr =
        Cut::all_of(&[not_vbf, boosted_cb, Cut::new("resonance_pt > 140000")]);

    let cb = |name: &str, label: &str, cuts: Cut, bins: Binning| {
        s.with_years(Category::new(name, &cuts & &s.common))
            .label(format!("#tau_{{had}}#tau_{{had}} {label}"))
            .fit_bins(10)
            .limit_bins(bins)
            .regions(Region::Ss, Region::Os)
            .norm_category("preselection")
    };

    vec![
        cb("cuts_vbf_lowdr", "Cut-based VBF Low dR", vbf_lowdr.clone(), Binning::Edges(vec![
            0.0, 64.0, 80.0, 92.0, 104.0, 116.0, 132.0, 176.0, INF,
        ]))
        .latex("VBF High-$p_T^{H}$"),
        cb("cuts_vbf_highdr_tight", "Cut-based VBF High dR Tight", vbf_highdr_tight.clone(), vbf_mass_bins())
            .latex("VBF Low-$p_T^{H}$ Tight"),
        cb("cuts_vbf_highdr_loose", "Cut-based VBF High dR Loose", vbf_highdr_loose.clone(), vbf_mass_bins())
            .latex("VBF Low-$p_T^{H}$ Loose"),
        cb("cuts_vbf_highdr", "Cut-based VBF High dR", &vbf_highdr_loose | &vbf_highdr_tight, vbf_mass_bins())
            .latex("VBF Low-$p_T^{H}$"),
        cb(
            "cuts_vbf",
            "Cut-based VBF",
            Cut::any_of(&[vbf_highdr_loose, vbf_highdr_tight, vbf_lowdr]).unwrap_or_default(),
            vbf_mass_bins(),
        ),
        cb("cuts_boosted_tight", "Cut-based Boosted Tight", boosted_tight.clone(), boosted_tight_mass_bins())
            .latex("Boosted High-$p_T^{H}$"),
        cb("cuts_boosted_loose", "Cut-based Boosted Loose", boosted_loose.clone(), boosted_loose_mass_bins())
            .latex("Boosted Low-$p_T^{H}$"),
        cb("cuts_boosted", "Cut-based Boosted", &boosted_tight | &boosted_loose, boosted_loose_mass_bins()),
        cb(
            "cuts_boosted_tight_nodrcut",
            "Cut-based Boosted Tight No dR Cut",
            boosted_nodr,
            boosted_tight_mass_bins(),
        ),
    ]
}
