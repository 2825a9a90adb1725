#[cfg(test)]
mod pipeline_tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use pgm_abw::config::{Config, ExperimentProfile};
    use pgm_abw::estimation::{
        self, generate_json_report, EstimationError, EstimationReport, Estimator, FitMethod,
        FitStatus, ProbeSample, ReportMetadata,
    };
    use pgm_abw::store::{self, InMemoryStore, MeasurementDump};
    use pgm_abw::synth::{self, SynthSpec};

    /// Config with a single experiment whose physical bound is 100 bytes/s
    fn small_config() -> Config {
        let mut config = Config::default();
        config.experiments.clear();
        config
            .experiments
            .insert("lab".to_string(), ExperimentProfile::new(400.0, 800.0));
        config
    }

    /// Sample whose features are exactly `(x, y)`
    fn xy(link: u64, x: f64, y: f64) -> ProbeSample {
        ProbeSample::new(link, 1, 1.0, y, x)
    }

    fn lab_store(samples: Vec<ProbeSample>) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.add_experiment(1, "lab");
        for sample in samples {
            store.add_sample(sample);
        }
        store
    }

    #[test]
    fn test_scenarios_end_to_end() {
        let mut samples = Vec::new();
        // link 1: y = 0.5x, crossing at 2
        samples.extend([(1.0, 0.5), (2.0, 1.0), (3.0, 1.5)].map(|(x, y)| xy(1, x, y)));
        // link 2: constant y
        samples.extend([1.0, 2.0, 3.0].map(|x| xy(2, x, 1.0)));
        // link 3: negative slope
        samples.extend([(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)].map(|(x, y)| xy(3, x, y)));
        // link 4: crossing at 200, beyond the 100 bytes/s bound
        samples.extend([(100.0, 0.5), (200.0, 1.0), (300.0, 1.5)].map(|(x, y)| xy(4, x, y)));

        let store = lab_store(samples);
        let config = small_config();

        for method in [FitMethod::Robust, FitMethod::Ols] {
            let estimator = Estimator::default().with_method(method);
            let estimates =
                estimation::estimate_experiment(&store, &config, &estimator, "lab").unwrap();

            assert_eq!(estimates.links.len(), 4);
            let ids: Vec<u64> = estimates.links.iter().map(|l| l.link_state_id).collect();
            assert_eq!(ids, vec![1, 2, 3, 4]);

            let link1 = estimates.get(1).unwrap();
            assert_eq!(link1.status, FitStatus::Valid);
            assert!((link1.estimated_abw.unwrap() - 2.0).abs() < 1e-9);

            assert_eq!(estimates.get(2).unwrap().status, FitStatus::DegenerateSlope);
            assert_eq!(estimates.get(3).unwrap().status, FitStatus::DegenerateSlope);
            assert_eq!(estimates.get(4).unwrap().status, FitStatus::OutOfBounds);
            assert_eq!(estimates.missing_ratio(), 0.75);
        }
    }

    #[test]
    fn test_unflagged_experiment_is_empty() {
        let mut sample = xy(1, 2.0, 1.0);
        sample.used_in_regression = false;
        let store = lab_store(vec![sample]);

        let estimates =
            estimation::estimate_experiment(&store, &small_config(), &Estimator::default(), "lab")
                .unwrap();
        assert!(estimates.links.is_empty());
        assert_eq!(estimates.total_samples, 1);
        assert_eq!(estimates.used_samples, 0);
    }

    #[test]
    fn test_unknown_experiment_aborts() {
        let store = lab_store(vec![xy(1, 1.0, 0.5)]);
        let err = estimation::estimate_experiment(
            &store,
            &small_config(),
            &Estimator::default(),
            "missing",
        )
        .unwrap_err();
        assert_eq!(err, EstimationError::NotFound("missing".to_string()));
    }

    #[test]
    fn test_json_and_snapshot_stores_agree() {
        let samples: Vec<ProbeSample> = (1..=5u64)
            .flat_map(|link| {
                let slope = 1.0 / (10.0 * link as f64);
                (1..=6).map(move |i| xy(link, i as f64 * 5.0, slope * i as f64 * 5.0 + 0.1))
            })
            .collect();
        let dump = lab_store(samples).to_dump();

        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("dump.json");
        let snapshot_path = dir.path().join("dump.bin.zst");
        store::write_json_dump(&dump, &json_path).unwrap();
        store::write_snapshot(&dump, &snapshot_path).unwrap();

        let from_json = store::open_store(&json_path).unwrap();
        let from_snapshot = store::open_store(&snapshot_path).unwrap();
        assert_eq!(from_snapshot.to_dump(), dump);
        assert_eq!(from_json.sample_count(), dump.samples.len());

        let config = small_config();
        let estimator = Estimator::default();
        let a = estimation::estimate_experiment(&from_json, &config, &estimator, "lab").unwrap();
        let b = estimation::estimate_experiment(&from_snapshot, &config, &estimator, "lab").unwrap();
        assert_eq!(a.valid_count(), 5);
        assert_eq!(b.valid_count(), 5);
        for (x, y) in a.links.iter().zip(&b.links) {
            assert_eq!(x.link_state_id, y.link_state_id);
            let (x, y) = (x.estimated_abw.unwrap(), y.estimated_abw.unwrap());
            assert!((x - y).abs() <= 1e-9 * y, "{x} != {y}");
        }
        // crossing at 9 * link
        assert!((b.get(3).unwrap().estimated_abw.unwrap() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_synthetic_abw_is_recovered() {
        let config = Config::default();
        let profile = *config.profile("exp1").unwrap();
        let abw = 250_000.0;

        let mut spec = SynthSpec::new(1, 20, 200, abw);
        spec.selection = config.selection.clone();
        let dump = synth::generate_dump("exp1", &profile, &spec, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let store = InMemoryStore::from_dump(dump);

        let estimates =
            estimation::estimate_experiment(&store, &config, &Estimator::default(), "exp1")
                .unwrap();
        assert_eq!(estimates.links.len(), 20);
        assert!(estimates.valid_count() >= 15);

        let median = estimation::report::median_estimate_bits(&estimates).unwrap() / 8.0;
        assert!(
            (median - abw).abs() / abw < 0.1,
            "median estimate {median} too far from {abw}"
        );
    }

    #[test]
    fn test_recomputed_candidates_match_generated_flags() {
        let config = Config::default();
        let profile = *config.profile("exp1").unwrap();
        let spec = SynthSpec::new(1, 3, 100, 300_000.0);
        let dump = synth::generate_dump("exp1", &profile, &spec, &mut StdRng::seed_from_u64(11))
            .unwrap();

        let stripped = MeasurementDump {
            experiments: dump.experiments.clone(),
            samples: dump
                .samples
                .iter()
                .cloned()
                .map(|mut s| {
                    s.used_in_regression = false;
                    s
                })
                .collect(),
        };

        let flagged = InMemoryStore::from_dump(dump);
        let recomputed = InMemoryStore::from_dump(stripped).with_recomputed_candidates(true);

        let estimator = Estimator::default();
        let a = estimation::estimate_experiment(&flagged, &config, &estimator, "exp1").unwrap();
        let b = estimation::estimate_experiment(&recomputed, &config, &estimator, "exp1").unwrap();
        assert_eq!(a.links, b.links);
    }

    #[test]
    fn test_report_marks_missing_estimates_null() {
        let store = lab_store(
            [(1.0, 0.5), (2.0, 1.0), (3.0, 1.5)]
                .map(|(x, y)| xy(1, x, y))
                .into_iter()
                .chain([1.0, 2.0].map(|x| xy(2, x, 1.0)))
                .collect(),
        );
        let estimates =
            estimation::estimate_experiment(&store, &small_config(), &Estimator::default(), "lab")
                .unwrap();

        let report = EstimationReport {
            metadata: ReportMetadata {
                analysis_timestamp: "2025-05-01T12:00:00+00:00".to_string(),
                store_path: "memory".to_string(),
                method: FitMethod::Robust,
                workers: 1,
            },
            experiments: vec![estimates],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estimates.json");
        generate_json_report(&report, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let links = json["experiments"][0]["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["status"], "valid");
        assert_eq!(links[1]["status"], "degenerate_slope");
        assert!(links[1]["estimated_abw"].is_null());
    }
}
