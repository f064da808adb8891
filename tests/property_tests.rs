//! Property-based tests for the experiment pipeline.
//!
//! - Splitter partitions are disjoint, complete and sized by the floor boundaries
//! - Splitting is deterministic for a fixed seed and never emits motif rows
//! - Confusion-matrix metrics obey their defining identities
//! - Top-k ranking marks exactly k classes, the k most probable ones

use proptest::prelude::*;

mod split_props {
    use super::*;
    use nodelab::nodelab_core::embedding::EmbeddingRecord;
    use nodelab::nodelab_core::split::{split_features, SplitConfig};
    use std::collections::{HashMap, HashSet};

    fn inputs(n: usize, motifs: usize) -> (HashMap<String, i64>, Vec<EmbeddingRecord>) {
        let labels = (0..n).map(|i| (i.to_string(), (i % 2) as i64)).collect();
        let mut records: Vec<EmbeddingRecord> = (0..n)
            .map(|i| EmbeddingRecord {
                id: i.to_string(),
                values: vec![format!("{i}.5"), "1".to_string()],
            })
            .collect();
        for m in 0..motifs {
            records.push(EmbeddingRecord {
                id: format!("motif_{m}"),
                values: vec!["0".to_string(), "0".to_string()],
            });
        }
        (labels, records)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn partitions_are_disjoint_and_complete(
            n in 0usize..300,
            motifs in 0usize..4,
            seed in any::<u64>(),
        ) {
            let (labels, records) = inputs(n, motifs);
            let cfg = SplitConfig::default().with_seed(seed);
            let split = split_features(&labels, records, &cfg).unwrap();

            let (train_end, val_end) = (n * 7 / 10, n * 8 / 10);
            prop_assert_eq!(split.train.len(), train_end);
            prop_assert_eq!(split.val.len(), val_end - train_end);
            prop_assert_eq!(split.test.len(), n - val_end);

            let mut seen = HashSet::new();
            for row in split.train.iter().chain(&split.val).chain(&split.test) {
                prop_assert!(!row.node.starts_with("motif"));
                prop_assert!(seen.insert(row.node.clone()), "duplicate node {}", row.node);
            }
            let expected: HashSet<String> = (0..n).map(|i| i.to_string()).collect();
            prop_assert_eq!(seen, expected);
        }

        #[test]
        fn same_seed_same_split(n in 1usize..200, seed in any::<u64>()) {
            let cfg = SplitConfig::default().with_seed(seed);
            let (labels, records) = inputs(n, 1);
            let a = split_features(&labels, records.clone(), &cfg).unwrap();
            let b = split_features(&labels, records, &cfg).unwrap();
            prop_assert_eq!(a.train, b.train);
            prop_assert_eq!(a.val, b.val);
            prop_assert_eq!(a.test, b.test);
        }
    }
}

mod metric_props {
    use super::*;
    use nodelab::nodelab_learn::metrics::{f1_score, BinaryMetrics, ConfusionMatrix};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn confusion_counts_every_binary_label(
            pairs in prop::collection::vec((any::<bool>(), 0.0f64..1.0), 0..100),
        ) {
            let labels: Vec<f64> = pairs.iter().map(|&(y, _)| if y { 1.0 } else { 0.0 }).collect();
            let preds: Vec<f64> = pairs.iter().map(|&(_, p)| p).collect();
            let m = ConfusionMatrix::from_predictions(&labels, &preds, 0.5).unwrap();
            prop_assert_eq!(m.total(), pairs.len());

            if let Ok(metrics) = BinaryMetrics::from_confusion(&m) {
                let acc = (m.tp + m.tn) as f64 / (m.tp + m.fp + m.tn + m.fn_) as f64;
                prop_assert_eq!(metrics.accuracy, acc);
                prop_assert_eq!(metrics.f1, f1_score(metrics.precision, metrics.recall));
            }
        }

        #[test]
        fn f1_is_harmonic_mean_or_zero(p in 0.0f64..=1.0, r in 0.0f64..=1.0) {
            let f1 = f1_score(p, r);
            if p + r == 0.0 {
                prop_assert_eq!(f1, 0.0);
            } else {
                prop_assert_eq!(f1, 2.0 * p * r / (p + r));
            }
        }
    }
}

mod topk_props {
    use super::*;
    use ndarray::{Array2, ArrayView2};
    use nodelab::nodelab_core::LabelMatrix;
    use nodelab::nodelab_learn::classifier::{ProbabilisticClassifier, TopKRanker};
    use nodelab::nodelab_learn::Result;

    /// Predicts the positive rate seen in training for every row.
    #[derive(Debug, Clone, Default)]
    struct Prior(f64);

    impl ProbabilisticClassifier for Prior {
        fn fit(&mut self, _x: ArrayView2<'_, f32>, y: &[f64]) -> Result<()> {
            self.0 = y.iter().sum::<f64>() / y.len().max(1) as f64;
            Ok(())
        }

        fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
            Ok(vec![self.0; x.nrows()])
        }
    }

    fn arb_labels() -> impl Strategy<Value = Array2<u8>> {
        (2usize..12, 2usize..8).prop_flat_map(|(rows, cols)| {
            prop::collection::vec(0u8..2, rows * cols)
                .prop_map(move |v| Array2::from_shape_vec((rows, cols), v).unwrap())
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn exactly_k_highest_classes(labels in arb_labels(), ks in prop::collection::vec(0usize..8, 4)) {
            let (rows, cols) = labels.dim();
            let x = Array2::<f32>::zeros((rows, 1));
            let mut ranker = TopKRanker::new(Prior::default());
            ranker.fit(x.view(), &LabelMatrix::Dense(labels.clone())).unwrap();

            let priors: Vec<f64> = labels
                .columns()
                .into_iter()
                .map(|c| c.iter().map(|&v| f64::from(v)).sum::<f64>() / rows as f64)
                .collect();

            let test = Array2::<f32>::zeros((ks.len(), 1));
            let out = ranker.predict(test.view(), &ks, cols).unwrap();

            for (i, &k) in ks.iter().enumerate() {
                let row = out.row(i);
                let chosen: Vec<usize> = (0..cols).filter(|&j| row[j] == 1).collect();
                prop_assert_eq!(chosen.len(), k.min(cols));
                for &c in &chosen {
                    for j in (0..cols).filter(|j| !chosen.contains(j)) {
                        prop_assert!(priors[c] >= priors[j]);
                    }
                }
            }
        }
    }
}
