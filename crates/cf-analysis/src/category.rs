//! Analysis categories and the read-only category registry.

use std::collections::{BTreeMap, HashMap};

use cf_core::{Error, Result, Year};
use cf_select::{Binning, Cut};
use serde::{Deserialize, Serialize};

use crate::region::Region;

/// A named region of phase space with epoch-specific selection overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier.
    pub name: String,
    /// Plot label.
    #[serde(default)]
    pub label: String,
    /// LaTeX label for tables.
    #[serde(default)]
    pub latex: Option<String>,
    /// Epoch-independent selection.
    #[serde(default)]
    pub cuts: Cut,
    /// Additional selection per data-taking year.
    #[serde(default)]
    pub year_cuts: BTreeMap<Year, Cut>,
    /// Classifier input variables.
    #[serde(default)]
    pub features: Vec<String>,
    /// Bin count used when fitting background normalizations.
    #[serde(default = "default_fit_bins")]
    pub fit_bins: usize,
    /// Binning of the final discriminant for limits.
    #[serde(default = "default_limit_bins")]
    pub limit_bins: Binning,
    /// Region providing the QCD shape.
    #[serde(default = "default_qcd_region")]
    pub qcd_shape_region: Region,
    /// Nominal analysis region.
    #[serde(default = "default_target_region")]
    pub target_region: Region,
    /// Category in which data-driven backgrounds are normalized (itself when `None`).
    #[serde(default)]
    pub norm_category: Option<String>,
}

fn default_fit_bins() -> usize {
    10
}

fn default_limit_bins() -> Binning {
    Binning::Constant(10)
}

fn default_qcd_region() -> Region {
    Region::Ss
}

fn default_target_region() -> Region {
    Region::Os
}

impl Category {
    /// Category with SS/OS regions and default binning.
    pub fn new(name: impl Into<String>, cuts: Cut) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            latex: None,
            cuts,
            year_cuts: BTreeMap::new(),
            features: Vec::new(),
            fit_bins: default_fit_bins(),
            limit_bins: default_limit_bins(),
            qcd_shape_region: default_qcd_region(),
            target_region: default_target_region(),
            norm_category: None,
        }
    }

    /// Set the plot label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the LaTeX label.
    pub fn latex(mut self, latex: impl Into<String>) -> Self {
        self.latex = Some(latex.into());
        self
    }

    /// Add a year overlay.
    pub fn year_cut(mut self, year: Year, cut: Cut) -> Self {
        self.year_cuts.insert(year, cut);
        self
    }

    /// Set the classifier features.
    pub fn features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Set the normalization fit bin count.
    pub fn fit_bins(mut self, bins: usize) -> Self {
        self.fit_bins = bins;
        self
    }

    /// Set the limit binning.
    pub fn limit_bins(mut self, binning: impl Into<Binning>) -> Self {
        self.limit_bins = binning.into();
        self
    }

    /// Set QCD shape and target regions.
    pub fn regions(mut self, qcd_shape_region: Region, target_region: Region) -> Self {
        self.qcd_shape_region = qcd_shape_region;
        self.target_region = target_region;
        self
    }

    /// Normalize data-driven backgrounds in another category.
    pub fn norm_category(mut self, name: impl Into<String>) -> Self {
        self.norm_category = Some(name.into());
        self
    }

    /// Base cuts combined with the overlay for `year`.
    ///
    /// A year without an overlay is an error, never a silent fallback.
    pub fn cuts_for_year(&self, year: Year) -> Result<Cut> {
        let overlay = self
            .year_cuts
            .get(&year)
            .ok_or_else(|| Error::UnknownEpoch { category: self.name.clone(), year })?;
        Ok(self.cuts.and(overlay))
    }

    /// Full selection for `year` in `region`.
    pub fn selection(&self, year: Year, region: Region) -> Result<Cut> {
        Ok(self.cuts_for_year(year)?.and(&region.cut()))
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("category name must not be empty".into()));
        }
        if self.fit_bins == 0 {
            return Err(Error::InvalidBinning(format!("category '{}': fit_bins must be > 0", self.name)));
        }
        self.limit_bins
            .validate()
            .map_err(|e| Error::InvalidBinning(format!("category '{}': {e}", self.name)))
    }
}

/// Assembles a [`CategoryRegistry`]; the only mutable phase of the registry.
#[derive(Debug, Default)]
pub struct CategoryRegistryBuilder {
    categories: Vec<Category>,
    groups: Vec<(String, Vec<String>)>,
}

impl CategoryRegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `category` and list it in `group`.
    pub fn category(mut self, group: &str, category: Category) -> Self {
        self.push_to_group(group, category.name.clone());
        self.categories.push(category);
        self
    }

    /// List an already added category in another group.
    pub fn alias(mut self, group: &str, name: &str) -> Self {
        self.push_to_group(group, name.to_string());
        self
    }

    fn push_to_group(&mut self, group: &str, name: String) {
        match self.groups.iter_mut().find(|(g, _)| g == group) {
            Some((_, names)) => names.push(name),
            None => self.groups.push((group.to_string(), vec![name])),
        }
    }

    /// Validate names, binnings and normalization references.
    pub fn build(self) -> Result<CategoryRegistry> {
        let mut by_name = HashMap::with_capacity(self.categories.len());
        for (i, c) in self.categories.iter().enumerate() {
            c.validate()?;
            if by_name.insert(c.name.clone(), i).is_some() {
                return Err(Error::Config(format!("duplicate category '{}'", c.name)));
            }
        }
        for c in &self.categories {
            if let Some(norm) = &c.norm_category
                && !by_name.contains_key(norm)
            {
                return Err(Error::UnknownCategory(format!(
                    "{norm} (normalization category of '{}')",
                    c.name
                )));
            }
        }
        let mut groups = Vec::with_capacity(self.groups.len());
        for (group, names) in self.groups {
            let indices = names
                .iter()
                .map(|n| by_name.get(n).copied().ok_or_else(|| Error::UnknownCategory(n.clone())))
                .collect::<Result<Vec<_>>>()?;
            groups.push((group, indices));
        }
        Ok(CategoryRegistry { categories: self.categories, by_name, groups })
    }
}

/// Read-only set of categories, organized in named groups.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    by_name: HashMap<String, usize>,
    groups: Vec<(String, Vec<usize>)>,
}

impl CategoryRegistry {
    /// Start a new registry.
    pub fn builder() -> CategoryRegistryBuilder {
        CategoryRegistryBuilder::new()
    }

    /// Category by name.
    pub fn get(&self, name: &str) -> Result<&Category> {
        self.by_name
            .get(name)
            .map(|&i| &self.categories[i])
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))
    }

    /// Categories of `group`, in definition order.
    pub fn group(&self, group: &str) -> Result<Vec<&Category>> {
        self.groups
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, idx)| idx.iter().map(|&i| &self.categories[i]).collect())
            .ok_or_else(|| Error::Config(format!("unknown category group '{group}'")))
    }

    /// Group names, in definition order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(g, _)| g.as_str())
    }

    /// Category used to normalize data-driven backgrounds for `category`.
    pub fn norm_category_of<'a>(&'a self, category: &'a Category) -> Result<&'a Category> {
        match &category.norm_category {
            Some(name) => self.get(name),
            None => Ok(category),
        }
    }

    /// All categories, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the registry holds no category.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
