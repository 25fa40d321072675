//! End-to-end scenarios across aggregation, agreement, evaluation and scoring.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use attribench_core::agreement::compare;
use attribench_core::config::PerturbationConfig;
use attribench_core::perturbation::faithfulness::masking_curve;
use attribench_core::{
    AggregationMode, Attribution, AttributionSample, Attributor, BenchError, Benchmark,
    CapabilityError, EngineConfig, EvaluationInstance, GlobalAggregator, LinearAttributor,
    LogisticClassifier, ModelUnderTest, PerturbationEvaluator, QualityCache, QualityScorer,
    QualityWeights, ReferenceDataset, ReferenceStats, interpret,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn sample(id: &str, values: [f64; 4]) -> AttributionSample {
    AttributionSample::new(
        id,
        [
            ("A", values[0]),
            ("B", values[1]),
            ("C", values[2]),
            ("D", values[3]),
        ],
    )
}

fn two_feature_setup() -> (Arc<LogisticClassifier>, Arc<ReferenceStats>) {
    let names = vec!["A".to_string(), "B".to_string()];
    let model = Arc::new(LogisticClassifier::new(names.clone(), vec![2.0, 1.0], 0.0));
    let reference = Arc::new(
        ReferenceStats::from_dataset(&ReferenceDataset::numeric(
            names,
            vec![
                vec![-1.0, -1.0],
                vec![1.0, 1.0],
                vec![0.5, -0.5],
                vec![-0.5, 0.5],
            ],
        ))
        .unwrap(),
    );
    (model, reference)
}

fn positive_instances(n: usize) -> Vec<EvaluationInstance> {
    (0..n)
        .map(|i| EvaluationInstance::new(format!("ok-{i}"), vec![1.0 + 0.2 * i as f64, 0.5]))
        .collect()
}

/// Fails on any instance whose first value is negative.
struct RejectsNegative;

impl Attributor for RejectsNegative {
    fn method(&self) -> &str {
        "rejects-negative"
    }

    fn attribute(&self, instance: &[f64]) -> Result<Attribution, CapabilityError> {
        if instance[0] < 0.0 {
            return Err(CapabilityError::Attributor("negative input".into()));
        }
        Ok(Attribution::new(BTreeMap::from([
            ("A".to_string(), 2.0 * instance[0]),
            ("B".to_string(), instance[1]),
        ])))
    }
}

/// Cancels the shared token on its first call.
struct CancelsOnFirstCall {
    token: CancellationToken,
    calls: AtomicUsize,
}

impl Attributor for CancelsOnFirstCall {
    fn method(&self) -> &str {
        "cancels"
    }

    fn attribute(&self, instance: &[f64]) -> Result<Attribution, CapabilityError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.token.cancel();
        }
        Ok(Attribution::new(BTreeMap::from([
            ("A".to_string(), instance[0]),
            ("B".to_string(), instance[1]),
        ])))
    }
}

#[test]
fn identical_methods_agree_then_diverge_on_a_differing_instance() {
    let aggregator = GlobalAggregator::with_mode(AggregationMode::MeanAbsolute);
    let shared: Vec<AttributionSample> = (0..3)
        .map(|i| sample(&format!("i{i}"), [0.5, -0.3, 0.1, 0.0]))
        .collect();

    let x = aggregator.aggregate("X", &shared).unwrap();
    let y = aggregator.aggregate("Y", &shared).unwrap();
    let same = compare(&x, &y, &[2], 20).unwrap();
    assert_eq!(same.top_k_overlap[&2], 1.0);
    assert_eq!(same.rank_correlation.spearman, 1.0);
    assert_eq!(x.top_k(4), vec!["A", "B", "C", "D"]);

    let differing = vec![sample("i9", [0.1, 0.5, -0.3, 0.0])];
    let y_shifted = aggregator.aggregate("Y", &differing).unwrap();
    assert_eq!(y_shifted.top_k(4), vec!["B", "C", "A", "D"]);

    let shifted = compare(&x, &y_shifted, &[2], 20).unwrap();
    let overlap = shifted.top_k_overlap[&2];
    assert!(overlap < 1.0 && overlap > 0.0, "overlap {overlap}");
    assert_eq!(overlap, 0.5);
    assert!(shifted.rank_correlation.spearman < 1.0);
}

#[test]
fn masking_the_true_driver_first_is_faithful() {
    let (model, _) = two_feature_setup();
    // contributions for sigmoid(2A + B) at A = 2, B = 1 against a zero baseline
    let curve = masking_curve(model.as_ref(), &[2.0, 1.0], &[4.0, 1.0], &[0.0, 0.0], None).unwrap();
    assert!(curve.faithfulness > 0.8, "faithfulness {}", curve.faithfulness);
}

#[tokio::test]
async fn linear_attributions_score_high_quality() {
    let (model, reference) = two_feature_setup();
    let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
    let evaluator = PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();

    let metrics = evaluator
        .evaluate(
            model,
            attributor,
            &positive_instances(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let score = QualityScorer::new(QualityWeights::new(0.5, 0.3, 0.2))
        .unwrap()
        .score(&metrics)
        .unwrap();

    assert_eq!(score.evaluated_instances, 5);
    assert!(score.faithfulness > 0.9);
    assert!(score.robustness > 0.9);
    assert!((0.0..=1.0).contains(&score.composite));
}

#[tokio::test]
async fn half_failing_instances_are_tolerated() {
    let (model, reference) = two_feature_setup();
    let mut instances = positive_instances(2);
    instances.push(EvaluationInstance::new("bad-0", vec![-1.0, 0.5]));
    instances.push(EvaluationInstance::new("bad-1", vec![-2.0, 0.5]));

    let evaluator = PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
    let metrics = evaluator
        .evaluate(
            model,
            Arc::new(RejectsNegative),
            &instances,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(metrics.skipped_count, 2);
    assert_eq!(metrics.evaluated_count(), 2);
    let failed: Vec<&str> = metrics
        .failures
        .iter()
        .map(|f| f.instance_id.as_str())
        .collect();
    assert_eq!(failed, vec!["bad-0", "bad-1"]);
}

#[tokio::test]
async fn majority_failing_instances_fail_the_evaluation() {
    let (model, reference) = two_feature_setup();
    let mut instances = positive_instances(1);
    for i in 0..3 {
        instances.push(EvaluationInstance::new(format!("bad-{i}"), vec![-1.0, 0.5]));
    }

    let evaluator = PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
    let err = evaluator
        .evaluate(
            model,
            Arc::new(RejectsNegative),
            &instances,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        BenchError::InsufficientValidSamples {
            skipped,
            total,
            limit,
            ..
        } => assert_eq!((skipped, total, limit), (3, 4, 2)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn evaluation_is_deterministic_for_a_fixed_seed() {
    let (model, reference) = two_feature_setup();
    let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
    let instances = positive_instances(4);
    let cancel = CancellationToken::new();

    let run = |workers: usize| {
        let evaluator = PerturbationEvaluator::new(
            reference.clone(),
            PerturbationConfig {
                workers: Some(workers),
                seed: 7,
                ..PerturbationConfig::default()
            },
        )
        .unwrap();
        let model = model.clone();
        let attributor = attributor.clone();
        let instances = instances.clone();
        let cancel = cancel.clone();
        async move {
            evaluator
                .evaluate(model, attributor, &instances, &cancel)
                .await
                .unwrap()
        }
    };

    let first = run(1).await;
    let second = run(4).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn cancellation_stops_remaining_instances() {
    let (model, reference) = two_feature_setup();
    let cancel = CancellationToken::new();
    let attributor = Arc::new(CancelsOnFirstCall {
        token: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let evaluator = PerturbationEvaluator::new(
        reference,
        PerturbationConfig {
            workers: Some(1),
            ..PerturbationConfig::default()
        },
    )
    .unwrap();

    let err = evaluator
        .evaluate(model, attributor, &positive_instances(5), &cancel)
        .await
        .unwrap_err();
    match err {
        BenchError::Cancelled { completed, total } => {
            assert_eq!(total, 5);
            assert!(completed < total);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cache_is_invalidated_when_the_model_changes() {
    let (model, reference) = two_feature_setup();
    let attributor: Arc<dyn Attributor> =
        Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
    let fingerprint = attribench_core::Classifier::fingerprint(model.as_ref());
    let under_test = ModelUnderTest::new("logreg", model);
    let bench = Benchmark::new(EngineConfig::default()).unwrap();
    let cache = QualityCache::new();
    let cancel = CancellationToken::new();
    let instances = positive_instances(3);
    let attributors = vec![attributor];

    bench
        .run(&under_test, reference.clone(), &attributors, &instances, Some(&cache), &cancel)
        .await
        .unwrap();
    let cached = bench
        .run(&under_test, reference.clone(), &attributors, &instances, Some(&cache), &cancel)
        .await
        .unwrap();
    assert_eq!(cached.cached_methods, vec!["linear"]);

    assert_eq!(cache.invalidate_model(&fingerprint), 1);
    let fresh = bench
        .run(&under_test, reference, &attributors, &instances, Some(&cache), &cancel)
        .await
        .unwrap();
    assert!(fresh.cached_methods.is_empty());
    assert_eq!(fresh.quality, cached.quality);
}

#[test]
fn evaluated_samples_read_as_low_or_high_risk() {
    let (model, reference) = two_feature_setup();
    let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
    let evaluator = PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
    let instances = vec![
        EvaluationInstance::new("low", vec![-1.0, -0.5]),
        EvaluationInstance::new("high", vec![1.0, 0.5]),
    ];

    let metrics = evaluator
        .evaluate_sequential(model, attributor, &instances, &CancellationToken::new())
        .unwrap();
    let samples = metrics.samples();

    // p(class 1) = sigmoid(-2.5)
    let low = &samples[0];
    assert!((low.predicted_value - 1.0 / (1.0 + 2.5f64.exp())).abs() < 1e-12);
    assert!(
        interpret(low, 2)
            .text
            .starts_with("The model predicts LOW RISK with 92.4% confidence.")
    );
    assert!(
        interpret(&samples[1], 2)
            .text
            .starts_with("The model predicts HIGH RISK with 92.4% confidence.")
    );
}
