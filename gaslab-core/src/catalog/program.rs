//! Measurement programs and their file locations.
//!
//! Each program is one [`ProgramConfig`] value holding explicit fields: base
//! location, path template, gas→path mapping, site list and
//! frequency→suffix mapping. Programs differ only in those values.

use super::gas::GasId;
use super::site::normalize_site_code;
use super::CatalogError;
use crate::data::layout::TableLayout;
use crate::domain::Frequency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Public HTTP root of the halocarbon data tree.
pub const DEFAULT_BASE_URL: &str = "https://gml.noaa.gov/aftp/data/hats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramId {
    /// Flask GC-MS (M3 and PR1 instruments).
    Msd,
    /// In situ GC, successor of RITS.
    Cats,
    /// In situ GC, predecessor of CATS.
    Rits,
    /// Flask GC-ECD.
    Otto,
    /// Flask ECD, NOAAflaskECD file family.
    Fecd,
    /// Original flask GC, preceded Otto.
    OldGc,
    /// Multi-program global and hemispheric means, published gap filled.
    Combined,
}

impl ProgramId {
    pub const ALL: [ProgramId; 7] = [
        ProgramId::Msd,
        ProgramId::Cats,
        ProgramId::Rits,
        ProgramId::Otto,
        ProgramId::Fecd,
        ProgramId::OldGc,
        ProgramId::Combined,
    ];

    /// Lowercase tag written into harmonized tables.
    pub fn tag(&self) -> &'static str {
        match self {
            ProgramId::Msd => "msd",
            ProgramId::Cats => "cats",
            ProgramId::Rits => "rits",
            ProgramId::Otto => "otto",
            ProgramId::Fecd => "fecd",
            ProgramId::OldGc => "oldgc",
            ProgramId::Combined => "combined",
        }
    }

    /// Directory name used in the data tree.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ProgramId::Msd => "GCMS",
            ProgramId::Cats => "CATS",
            ProgramId::Rits => "RITS",
            ProgramId::Otto => "Otto",
            ProgramId::Fecd => "fECD",
            ProgramId::OldGc => "OldGC",
            ProgramId::Combined => "combined",
        }
    }

    fn valid_names() -> String {
        ProgramId::ALL
            .iter()
            .map(|p| p.tag())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ProgramId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', '_'], "").as_str() {
            "MSD" | "M3" | "PR1" | "GCMS" => Ok(ProgramId::Msd),
            "CATS" | "INSITU" => Ok(ProgramId::Cats),
            "RITS" => Ok(ProgramId::Rits),
            "OTTO" => Ok(ProgramId::Otto),
            "FECD" => Ok(ProgramId::Fecd),
            "OLDGC" => Ok(ProgramId::OldGc),
            "COMBINED" | "HATS" | "GLOBAL" => Ok(ProgramId::Combined),
            _ => Err(CatalogError::UnknownProgram {
                name: s.to_string(),
                valid: ProgramId::valid_names(),
            }),
        }
    }
}

/// Where one gas lives within a program's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPath {
    /// Directory (or, for network-wide files, the full relative file path).
    pub dir: String,
    /// Code used in file names when it differs from the gas identifier.
    pub file_code: Option<String>,
}

impl GasPath {
    fn new(dir: &str) -> Self {
        Self {
            dir: dir.to_string(),
            file_code: None,
        }
    }

    fn coded(dir: &str, code: &str) -> Self {
        Self {
            dir: dir.to_string(),
            file_code: Some(code.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteCase {
    Lower,
    Upper,
}

/// How a program distributes its data over files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// One file per (gas, site, frequency).
    PerSite,
    /// One file per gas holding every site, identified by a site column.
    Network,
    /// One file per gas holding one value column (and `_sd` column) per
    /// region, named by the file's header line.
    Regional,
}

/// Location and format configuration of one measurement program.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub id: ProgramId,
    pub base_url: String,
    /// Relative path template. Placeholders: `{dir}`, `{freq}`, `{site}`,
    /// `{code}`, `{gas}`, `{suffix}`.
    pub template: String,
    pub gases: BTreeMap<GasId, GasPath>,
    pub sites: Vec<String>,
    pub suffixes: BTreeMap<Frequency, String>,
    pub layouts: BTreeMap<Frequency, TableLayout>,
    pub site_case: SiteCase,
    pub file_layout: FileLayout,
    /// False when the program's mole fractions are too coarse for a model
    /// fit or arrive already gap filled.
    pub gapfill_eligible: bool,
}

fn gas_map(entries: &[(&str, GasPath)]) -> BTreeMap<GasId, GasPath> {
    entries
        .iter()
        .filter_map(|(gas, path)| GasId::parse(gas).ok().map(|id| (id, path.clone())))
        .collect()
}

fn site_list(sites: &[&str]) -> Vec<String> {
    sites.iter().map(|s| s.to_string()).collect()
}

impl ProgramConfig {
    /// Flask GC-MS network files (one file per gas, all sites).
    pub fn msd(base_url: &str) -> Self {
        let gases = gas_map(&[
            ("F11", GasPath::new("cfcs/cfc11/flasks/GCMS/CFC11b_GCMS_flask_2010.txt")),
            ("F113", GasPath::new("cfcs/cfc113/flasks/GCMS/CFC113_GCMS_flask.txt")),
            ("F12", GasPath::new("cfcs/cfc12/flasks/GCMS/CFC12_GCMS_flask_2010.txt")),
            ("h1211", GasPath::new("halons/flasks/HAL1211_GCMS_flask.txt")),
            ("h2402", GasPath::new("halons/flasks/Hal2402_GCMS_flask.txt")),
            ("h1301", GasPath::new("halons/flasks/H-1301_M2_PR1_MS_flask.txt")),
            ("HCFC141b", GasPath::new("hcfcs/hcfc141b/HCFC141B_GCMS_flask.txt")),
            ("HCFC142b", GasPath::new("hcfcs/hcfc142b/flasks/HCFC142B_GCMS_flask.txt")),
            ("HCFC22", GasPath::new("hcfcs/hcfc22/flasks/HCFC22_GCMS_flask.txt")),
            ("HFC152a", GasPath::new("hfcs/hf152a_GCMS_flask.txt")),
            ("HFC134a", GasPath::new("hfcs/hfc134a_GCMS_flask.txt")),
            ("HFC143a", GasPath::new("hfcs/HFC-143a_M2_PR1_MS_flask.txt")),
            ("HFC365mfc", GasPath::new("hfcs/HFC-365mfc_GCMS_flask.txt")),
            ("HFC32", GasPath::new("hfcs/HFC-32_M2_PR1_MS_flask.txt")),
            ("HFC227ea", GasPath::new("hfcs/HFC-227ea_GCMS_flask.txt")),
            ("HFC125", GasPath::new("hfcs/HFC-125_M2_PR1_MS_flask.txt")),
            ("CH3Br", GasPath::new("methylhalides/ch3br/flasks/CH3BR_GCMS_flask.txt")),
            ("CH3Cl", GasPath::new("methylhalides/ch3cl/flasks/CH3Cl_GCMS_flask.txt")),
            ("C2Cl4", GasPath::new("solvents/C2Cl4/flasks/pce_GCMS_flask.txt")),
            ("CH2Cl2", GasPath::new("solvents/CH2Cl2/flasks/ch2cl2_GCMS_flask.txt")),
            ("CH3CCl3", GasPath::new("solvents/CH3CCl3/flasks/GCMS/CH3CCL3_GCMS_flask.txt")),
            ("OCS", GasPath::new("carbonyl_sulfide/OCS__GCMS_flask.txt")),
            ("C3H8", GasPath::new("PERSEUS/C3H8_PR1_MS_flask.txt")),
            ("C2H6", GasPath::new("PERSEUS/C2H6_PR1_MS_flask.txt")),
            ("CF4", GasPath::new("PERSEUS/CF4_PR1_MS_flask.txt")),
            ("NF3", GasPath::new("PERSEUS/NF3_PR1_MS_flask.txt")),
            ("PFC116", GasPath::new("PERSEUS/PFC-116_PR1_MS_flask.txt")),
            ("SO2F2", GasPath::new("PERSEUS/SO2F2_PR1_MS_flask.txt")),
            ("HFC236fa", GasPath::new("PERSEUS/HFC-236fa_PR1_MS_flask.txt")),
            ("C2H2", GasPath::new("PERSEUS/C2H2_PR1_MS_flask.txt")),
            ("F114", GasPath::new("PERSEUS/CFC-114_PR1_MS_flask.txt")),
            ("F115", GasPath::new("PERSEUS/CFC-115_PR1_MS_flask.txt")),
            ("F13", GasPath::new("PERSEUS/CFC-13_PR1_MS_flask.txt")),
            ("HCFC123", GasPath::new("PERSEUS/HCFC-123_PR1_MS_flask.txt")),
            ("HCFC124", GasPath::new("PERSEUS/HCFC-124_PR1_MS_flask.txt")),
            ("HCFC133a", GasPath::new("PERSEUS/HCFC-133a_PR1_MS_flask.txt")),
            ("HFO1234yf", GasPath::new("PERSEUS/HFO-1234yf_PR1_MS_flask.txt")),
            ("HFO1234ze", GasPath::new("PERSEUS/HFO-1234ze_PR1_MS_flask.txt")),
            ("PFC218", GasPath::new("PERSEUS/PFC-218_PR1_MS_flask.txt")),
            ("SF6", GasPath::new("PERSEUS/SF6_PR1_MS_flask.txt")),
            ("i-butane", GasPath::new("PERSEUS/i-butane_PR1_MS_flask.txt")),
            ("i-pentane", GasPath::new("PERSEUS/i-pentane_PR1_MS_flask.txt")),
            ("n-butane", GasPath::new("PERSEUS/n-butane_PR1_MS_flask.txt")),
            ("n-hexane", GasPath::new("PERSEUS/n-hexane_PR1_MS_flask.txt")),
            ("n-pentane", GasPath::new("PERSEUS/n-pentane_PR1_MS_flask.txt")),
        ]);

        let mut suffixes = BTreeMap::new();
        suffixes.insert(Frequency::Monthly, String::new());
        let mut layouts = BTreeMap::new();
        layouts.insert(Frequency::Monthly, TableLayout::flask_pairs());

        Self {
            id: ProgramId::Msd,
            base_url: base_url.to_string(),
            template: "{dir}".into(),
            gases,
            sites: site_list(&[
                "alt", "brw", "cgo", "hfm", "kum", "lef", "mhd", "mlo", "nwr", "psa", "smo",
                "spo", "sum", "thd", "ush",
            ]),
            suffixes,
            layouts,
            site_case: SiteCase::Lower,
            file_layout: FileLayout::Network,
            gapfill_eligible: true,
        }
    }

    /// In situ GC programs (CATS or RITS), hourly/daily/monthly per site.
    pub fn insitu(id: ProgramId, base_url: &str) -> Self {
        let mut entries = vec![
            ("F11", GasPath::new("cfcs/cfc11")),
            ("F12", GasPath::new("cfcs/cfc12")),
            ("h1211", GasPath::coded("halons", "H1211")),
            ("N2O", GasPath::new("n2o")),
            ("CCl4", GasPath::new("solvents/CCl4")),
            ("CH3CCl3", GasPath::coded("solvents/CH3CCl3", "MC")),
        ];
        let mut sites = vec!["brw", "nwr", "mlo", "smo", "spo"];
        if id == ProgramId::Cats {
            entries.push(("F113", GasPath::new("cfcs/cfc113")));
            entries.push(("SF6", GasPath::new("sf6")));
            sites.push("sum");
        }

        let suffixes = [
            (Frequency::Hourly, "All"),
            (Frequency::Daily, "Day"),
            (Frequency::Monthly, "MM"),
        ]
        .into_iter()
        .map(|(f, s)| (f, s.to_string()))
        .collect();

        let layouts = [
            (Frequency::Hourly, TableLayout::insitu_hourly()),
            (Frequency::Daily, TableLayout::insitu_daily()),
            (Frequency::Monthly, TableLayout::insitu_monthly()),
        ]
        .into_iter()
        .collect();

        Self {
            id,
            base_url: base_url.to_string(),
            template: format!("{{dir}}/insituGCs/{}/{{freq}}/{{site}}_{{code}}_{{suffix}}.dat", id.dir_name()),
            gases: gas_map(&entries),
            sites: site_list(&sites),
            suffixes,
            layouts,
            site_case: SiteCase::Lower,
            file_layout: FileLayout::PerSite,
            gapfill_eligible: true,
        }
    }

    /// Flask GC-ECD programs (Otto, fECD, OldGC), monthly per site.
    pub fn flask_ecd(id: ProgramId, base_url: &str) -> Self {
        let all_gases = [
            ("F11", GasPath::new("cfcs/cfc11")),
            ("F12", GasPath::new("cfcs/cfc12")),
            ("F113", GasPath::new("cfcs/cfc113")),
            ("N2O", GasPath::new("n2o")),
            ("SF6", GasPath::new("sf6")),
            ("CCl4", GasPath::new("solvents/CCl4")),
            ("CH3CCl3", GasPath::coded("solvents/CH3CCl3", "MC")),
        ];

        let (sites, gases, template, site_case): (&[&str], Vec<(&str, GasPath)>, &str, SiteCase) =
            match id {
                ProgramId::Fecd => (
                    &[
                        "alt", "sum", "brw", "cgo", "kum", "mhd", "mlo", "nwr", "thd", "rpb",
                        "smo", "ush", "psa", "spo",
                    ],
                    all_gases.to_vec(),
                    "{dir}/flasks/fECD/{freq}/{gas}_{site}_NOAAflaskECD_{suffix}.txt",
                    SiteCase::Upper,
                ),
                ProgramId::OldGc => (
                    &["alt", "brw", "cgo", "nwr", "mlo", "smo", "spo"],
                    all_gases
                        .iter()
                        .filter(|(g, _)| matches!(*g, "F11" | "F12" | "N2O"))
                        .cloned()
                        .collect(),
                    "{dir}/flasks/OldGC/{freq}/{site}_{code}_{suffix}.dat",
                    SiteCase::Upper,
                ),
                _ => (
                    &[
                        "alt", "sum", "brw", "cgo", "kum", "mhd", "mlo", "nwr", "thd", "smo",
                        "ush", "psa", "spo",
                    ],
                    all_gases.to_vec(),
                    "{dir}/flasks/Otto/{freq}/{site}_{code}_{suffix}.dat",
                    SiteCase::Lower,
                ),
            };

        let mut suffixes = BTreeMap::new();
        suffixes.insert(Frequency::Monthly, "MM".to_string());
        let mut layouts = BTreeMap::new();
        layouts.insert(Frequency::Monthly, TableLayout::flask_monthly());

        Self {
            id,
            base_url: base_url.to_string(),
            template: template.to_string(),
            gases: gas_map(&gases),
            sites: site_list(sites),
            suffixes,
            layouts,
            site_case,
            file_layout: FileLayout::PerSite,
            gapfill_eligible: true,
        }
    }

    /// Combined global and hemispheric monthly means. The published series
    /// are already gap filled upstream, so they are never refitted.
    pub fn combined(base_url: &str) -> Self {
        let gases = gas_map(&[
            ("F11", GasPath::new("cfcs/cfc11/combined/HATS_global_F11.txt")),
            ("F12", GasPath::new("cfcs/cfc12/combined/HATS_global_F12.txt")),
            ("F113", GasPath::new("cfcs/cfc113/combined/HATS_global_F113.txt")),
            ("CCl4", GasPath::new("solvents/CCl4/combined/HATS_global_CCl4.txt")),
            ("N2O", GasPath::new("n2o/combined/GML_global_N2O.txt")),
            ("SF6", GasPath::new("sf6/combined/GML_global_SF6.txt")),
        ]);

        let mut suffixes = BTreeMap::new();
        suffixes.insert(Frequency::Monthly, String::new());
        let mut layouts = BTreeMap::new();
        layouts.insert(Frequency::Monthly, TableLayout::combined());

        Self {
            id: ProgramId::Combined,
            base_url: base_url.to_string(),
            template: "{dir}".into(),
            gases,
            sites: site_list(&["global", "nh", "sh"]),
            suffixes,
            layouts,
            site_case: SiteCase::Lower,
            file_layout: FileLayout::Regional,
            gapfill_eligible: false,
        }
    }

    /// Default configuration for a program rooted at `base_url`.
    pub fn for_program(id: ProgramId, base_url: &str) -> Self {
        match id {
            ProgramId::Msd => Self::msd(base_url),
            ProgramId::Cats | ProgramId::Rits => Self::insitu(id, base_url),
            ProgramId::Otto | ProgramId::Fecd | ProgramId::OldGc => Self::flask_ecd(id, base_url),
            ProgramId::Combined => Self::combined(base_url),
        }
    }

    pub fn measures(&self, gas: &GasId) -> bool {
        self.gases.contains_key(gas)
    }

    pub fn publishes(&self, freq: Frequency) -> bool {
        self.suffixes.contains_key(&freq) && self.layouts.contains_key(&freq)
    }

    pub fn has_site(&self, site: &str) -> bool {
        let site = normalize_site_code(site);
        self.sites.iter().any(|s| *s == site)
    }

    pub fn layout(&self, freq: Frequency) -> Result<&TableLayout, CatalogError> {
        self.layouts
            .get(&freq)
            .ok_or_else(|| CatalogError::FrequencyNotPublished {
                program: self.id.to_string(),
                freq: freq.to_string(),
            })
    }

    /// Check that this program publishes `gas` at `freq` before fetching.
    pub fn validate(&self, gas: &GasId, freq: Frequency) -> Result<(), CatalogError> {
        if !self.measures(gas) {
            return Err(CatalogError::GasNotMeasured {
                program: self.id.to_string(),
                gas: gas.to_string(),
                measured: self
                    .gases
                    .keys()
                    .map(|g| g.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        if !self.publishes(freq) {
            return Err(CatalogError::FrequencyNotPublished {
                program: self.id.to_string(),
                freq: freq.to_string(),
            });
        }
        Ok(())
    }

    /// Path of the file holding `gas` at `site`, relative to the data root.
    pub fn relative_path(
        &self,
        gas: &GasId,
        site: &str,
        freq: Frequency,
    ) -> Result<String, CatalogError> {
        self.validate(gas, freq)?;
        let path = self.gases.get(gas).ok_or_else(|| CatalogError::GasNotMeasured {
            program: self.id.to_string(),
            gas: gas.to_string(),
            measured: String::new(),
        })?;
        let suffix = self.suffixes.get(&freq).map(String::as_str).unwrap_or_default();

        let site = normalize_site_code(site);
        let site = match self.site_case {
            SiteCase::Lower => site,
            SiteCase::Upper => site.to_uppercase(),
        };
        let code = path.file_code.as_deref().unwrap_or(gas.as_str());

        Ok(self
            .template
            .replace("{dir}", &path.dir)
            .replace("{freq}", freq.as_str())
            .replace("{site}", &site)
            .replace("{code}", code)
            .replace("{gas}", gas.as_str())
            .replace("{suffix}", suffix))
    }

    /// Full URL of the file holding `gas` at `site`.
    pub fn url(&self, gas: &GasId, site: &str, freq: Frequency) -> Result<String, CatalogError> {
        let rel = self.relative_path(gas, site, freq)?;
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), rel))
    }
}

/// All program configurations sharing one data root.
#[derive(Debug, Clone)]
pub struct ProgramCatalog {
    programs: BTreeMap<ProgramId, ProgramConfig>,
}

impl ProgramCatalog {
    pub fn new(base_url: &str) -> Self {
        let programs = ProgramId::ALL
            .iter()
            .map(|id| (*id, ProgramConfig::for_program(*id, base_url)))
            .collect();
        Self { programs }
    }

    /// Replace (or add) one program's configuration.
    pub fn with_program(mut self, config: ProgramConfig) -> Self {
        self.programs.insert(config.id, config);
        self
    }

    pub fn get(&self, id: ProgramId) -> Option<&ProgramConfig> {
        self.programs.get(&id)
    }

    /// Resolve a program alias to its configuration.
    pub fn resolve(&self, name: &str) -> Result<&ProgramConfig, CatalogError> {
        let id: ProgramId = name.parse()?;
        self.programs.get(&id).ok_or_else(|| CatalogError::UnknownProgram {
            name: name.to_string(),
            valid: ProgramId::valid_names(),
        })
    }

    pub fn programs(&self) -> impl Iterator<Item = &ProgramConfig> {
        self.programs.values()
    }

    /// Programs measuring `gas`.
    pub fn programs_for(&self, gas: &GasId) -> Vec<ProgramId> {
        self.programs
            .values()
            .filter(|p| p.measures(gas))
            .map(|p| p.id)
            .collect()
    }
}

impl Default for ProgramCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
