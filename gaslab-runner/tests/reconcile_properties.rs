//! Reconciliation properties over generated program collections.

use gaslab_core::catalog::{GasId, ProgramCatalog, ProgramId, StaticSiteRegistry};
use gaslab_core::data::SyntheticFetcher;
use gaslab_core::domain::{month_timestamp, Frequency, MeasurementPoint, SiteSeries};
use gaslab_runner::{
    flatten, load_programs, reconcile, CollectionMeta, LoadRequest, ProgramCollection, SiteData,
    SiteEntry,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const SITES: [&str; 6] = ["alt", "brw", "mlo", "smo", "spo", "sum"];

fn collection(program: ProgramId, sites: &BTreeSet<usize>, months: usize, scale: f64) -> ProgramCollection {
    let mut coll = ProgramCollection::new(CollectionMeta {
        gas: GasId::parse("F11").unwrap(),
        program,
        freq: Frequency::Monthly,
        gapfill: None,
    });
    for &i in sites {
        let site = SITES[i];
        let points = (0..months)
            .map(|m| {
                let ts = month_timestamp(2010 + (m / 12) as i32, (m % 12) as u32 + 1).unwrap();
                MeasurementPoint::new(ts, Some(scale * (240.0 + i as f64 + m as f64 * 0.1)), None, None)
            })
            .collect();
        let series = SiteSeries::new(site, points).unwrap();
        coll.insert(site, SiteEntry { data: SiteData::Raw(series), location: None });
    }
    coll
}

fn site_set() -> impl Strategy<Value = BTreeSet<usize>> {
    proptest::collection::btree_set(0..SITES.len(), 0..=SITES.len())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ratios_only_for_sites_in_both(a in site_set(), b in site_set(), months in 1usize..30) {
        let ca = collection(ProgramId::Cats, &a, months, 2.0);
        let cb = collection(ProgramId::Fecd, &b, months, 1.0);
        let rec = reconcile(&[ca, cb], ProgramId::Cats, ProgramId::Fecd).unwrap();

        let common: BTreeSet<&str> = a.intersection(&b).map(|&i| SITES[i]).collect();
        let ratio_sites: BTreeSet<&str> = rec.ratios.iter().map(|r| r.site.as_str()).collect();
        prop_assert_eq!(&ratio_sites, &common);
        prop_assert_eq!(rec.ratios.len(), common.len() * months);
        for r in &rec.ratios {
            prop_assert!((r.ratio - 2.0).abs() < 1e-9);
        }
        for t in &rec.trend {
            prop_assert_eq!(t.n_sites, common.len());
        }
    }

    #[test]
    fn empty_collections_merge_to_empty_table(n in 0usize..4) {
        let empties: Vec<ProgramCollection> = (0..n)
            .map(|_| collection(ProgramId::Otto, &BTreeSet::new(), 12, 1.0))
            .collect();
        let table = flatten(&empties).unwrap();
        prop_assert!(table.is_empty());
        let rec = reconcile(&empties, ProgramId::Otto, ProgramId::Cats).unwrap();
        prop_assert!(rec.ratios.is_empty());
    }
}

#[test]
fn synthetic_cats_vs_rits_excludes_cats_only_site() {
    let fetcher = SyntheticFetcher::new(11);
    let collections = load_programs(
        &LoadRequest::new("N2O", "cats"),
        &["cats".to_string(), "rits".to_string()],
        &fetcher,
        &ProgramCatalog::default(),
        &StaticSiteRegistry::network_default(),
    )
    .unwrap();

    let rec = reconcile(&collections, ProgramId::Cats, ProgramId::Rits).unwrap();
    let ratio_sites: BTreeSet<&str> = rec.ratios.iter().map(|r| r.site.as_str()).collect();
    assert!(!ratio_sites.contains("sum"));
    assert!(!ratio_sites.is_empty());
    assert_eq!(rec.table.meta.programs, vec![ProgramId::Cats, ProgramId::Rits]);
    assert!(rec.table.sites_of(ProgramId::Cats).contains("sum"));
}
