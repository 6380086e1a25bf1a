use crate::core::instances::{Instance, Scores};
use crate::error::Result;
use crate::evaluation::metrics::metric::{
    ConfidenceConfig, Metric, Resampling, attach_global, existing_global,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Computes scores from a whole collection of predictions at once.
pub trait GlobalScorer: Send + Sync {
    /// Catalog name, e.g. `f1_macro`.
    fn name(&self) -> &str;

    fn main_score(&self) -> &str;

    fn compute(
        &self,
        references: &[Vec<Value>],
        predictions: &[Value],
        task_data: &[Map<String, Value>],
    ) -> Result<Scores>;

    /// Whether each instance also gets scores computed on itself alone.
    fn process_single_instances(&self) -> bool {
        true
    }
}

/// A metric whose global score is computed over the whole stream; the
/// confidence interval resamples instances and recomputes it.
#[derive(Debug, Clone)]
pub struct GlobalMetric<S> {
    scorer: S,
    confidence: ConfidenceConfig,
}

impl<S: GlobalScorer> GlobalMetric<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            confidence: ConfidenceConfig::global_default(),
        }
    }

    pub fn with_confidence(mut self, confidence: ConfidenceConfig) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_n_resamples(mut self, n_resamples: Option<usize>) -> Self {
        self.confidence.n_resamples = n_resamples;
        self
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    fn with_score_fields(&self, mut scores: Scores) -> Scores {
        let main = self.scorer.main_score();
        let value = scores.get(main).cloned().unwrap_or(f64::NAN.into());
        scores.insert("score", value);
        scores.insert("score_name", main);
        scores
    }

    /// Scores of one instance on its own; a failure there only marks the
    /// instance as unscored.
    fn single_instance_scores(&self, references: &[Value], prediction: &Value, task_data: &Map<String, Value>) -> Scores {
        let result = self.scorer.compute(
            std::slice::from_ref(&references.to_vec()),
            std::slice::from_ref(prediction),
            std::slice::from_ref(task_data),
        );
        match result {
            Ok(scores) => self.with_score_fields(scores),
            Err(err) => {
                debug!(metric = self.scorer.name(), %err, "instance left unscored");
                let mut scores = Scores::new();
                scores.insert(self.scorer.main_score(), f64::NAN);
                self.with_score_fields(scores)
            }
        }
    }
}

impl<S: GlobalScorer> Metric for GlobalMetric<S> {
    fn main_score(&self) -> &str {
        self.scorer.main_score()
    }

    fn confidence(&self) -> &ConfidenceConfig {
        &self.confidence
    }

    fn score_instances(&self, mut instances: Vec<Instance>, resampling: Resampling) -> Result<Vec<Instance>> {
        let mut references = Vec::with_capacity(instances.len());
        let mut predictions = Vec::with_capacity(instances.len());
        let mut task_data = Vec::with_capacity(instances.len());
        for instance in &instances {
            references.push(instance.references()?.to_vec());
            predictions.push(instance.prediction()?.clone());
            task_data.push(instance.task_data()?.cloned().unwrap_or_default());
        }

        let mut global = existing_global(&instances);
        global.extend(self.with_score_fields(self.scorer.compute(&references, &predictions, &task_data)?));

        if self.scorer.process_single_instances() {
            for (i, instance) in instances.iter_mut().enumerate() {
                let scores = self.single_instance_scores(&references[i], &predictions[i], &task_data[i]);
                instance.score_mut().instance.extend(scores);
            }
        }

        let main = self.scorer.main_score();
        if let Some(bootstrap) = self.confidence.bootstrap(resampling, instances.len()) {
            let indices: Vec<usize> = (0..instances.len()).collect();
            let ci = bootstrap.interval(&indices, |sample| {
                let refs: Vec<Vec<Value>> = sample.iter().map(|&&i| references[i].clone()).collect();
                let preds: Vec<Value> = sample.iter().map(|&&i| predictions[i].clone()).collect();
                let data: Vec<Map<String, Value>> = sample.iter().map(|&&i| task_data[i].clone()).collect();
                match self.scorer.compute(&refs, &preds, &data) {
                    Ok(scores) => scores.number(main).unwrap_or(f64::NAN),
                    Err(err) => {
                        warn!(metric = self.scorer.name(), %err, "resample could not be scored");
                        f64::NAN
                    }
                }
            });
            global.insert(format!("{main}_ci_low"), ci.low);
            global.insert(format!("{main}_ci_high"), ci.high);
            global.insert("score_ci_low", ci.low);
            global.insert("score_ci_high", ci.high);
        }

        attach_global(&mut instances, &global);
        Ok(instances)
    }
}
