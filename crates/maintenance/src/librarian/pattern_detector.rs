use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_vector::{cosine_similarity, EmbeddingService};

#[derive(Debug, Clone, Deserialize)]
pub struct TrajectoryStep {
    pub action: String,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExperienceSample {
    pub id: Uuid,
    pub content: String,
    pub trajectory: Vec<TrajectoryStep>,
    pub succeeded: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternGroup {
    pub experiences: Vec<Uuid>,
    pub exemplar: Uuid,
    pub embedding_similarity: f32,
    pub trajectory_similarity: f32,
    pub confidence: f32,
    pub suggested_pattern: String,
    pub common_actions: Vec<String>,
    pub success_rate: f32,
}

pub struct PatternDetectorConfig {
    pub max_experiences: usize,
    pub min_pattern_size: usize,
    pub embedding_similarity_threshold: f32,
    pub trajectory_similarity_threshold: f32,
}

impl Default for PatternDetectorConfig {
    fn default() -> Self {
        Self {
            max_experiences: 200,
            min_pattern_size: 2,
            embedding_similarity_threshold: 0.75,
            trajectory_similarity_threshold: 0.5,
        }
    }
}

/// Longest-common-subsequence over `(action, tool)` tuples, normalized by
/// the longer trajectory's length.
fn trajectory_similarity(a: &[TrajectoryStep], b: &[TrajectoryStep]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1].action == b[j - 1].action && a[i - 1].tool == b[j - 1].tool {
                table[i][j] = table[i - 1][j - 1] + 1;
            } else {
                table[i][j] = table[i - 1][j].max(table[i][j - 1]);
            }
        }
    }
    let lcs = table[a.len()][b.len()] as f32;
    lcs / a.len().max(b.len()) as f32
}

fn common_actions(a: &[TrajectoryStep], b: &[TrajectoryStep]) -> Vec<String> {
    let b_actions: std::collections::HashSet<&str> = b.iter().map(|s| s.action.as_str()).collect();
    a.iter()
        .map(|s| s.action.as_str())
        .filter(|action| b_actions.contains(action))
        .map(String::from)
        .collect()
}

/// Stage 1 of the Librarian pipeline: pairwise embedding and
/// trajectory similarity, co-clustered when both exceed threshold.
pub async fn detect_patterns(
    samples: &[ExperienceSample],
    embedder: &dyn EmbeddingService,
    config: &PatternDetectorConfig,
) -> Vec<PatternGroup> {
    let samples: Vec<&ExperienceSample> = samples.iter().take(config.max_experiences).collect();
    let mut embeddings: Vec<Option<Vec<f32>>> = Vec::with_capacity(samples.len());
    for sample in &samples {
        embeddings.push(if embedder.is_available() {
            embedder.embed(&sample.content).await.ok().map(|e| e.vector)
        } else {
            None
        });
    }

    let mut visited = vec![false; samples.len()];
    let mut groups = Vec::new();

    for i in 0..samples.len() {
        if visited[i] {
            continue;
        }
        let mut cluster = vec![i];
        for j in (i + 1)..samples.len() {
            if visited[j] {
                continue;
            }
            let embedding_sim = match (&embeddings[i], &embeddings[j]) {
                (Some(a), Some(b)) => cosine_similarity(a, b),
                _ => 0.0,
            };
            let trajectory_sim = trajectory_similarity(&samples[i].trajectory, &samples[j].trajectory);
            if embedding_sim >= config.embedding_similarity_threshold && trajectory_sim >= config.trajectory_similarity_threshold {
                cluster.push(j);
            }
        }
        if cluster.len() < config.min_pattern_size {
            continue;
        }
        for &idx in &cluster {
            visited[idx] = true;
        }

        let exemplar_idx = cluster[0];
        let avg_embedding_sim = pairwise_average(&cluster, |a, b| match (&embeddings[a], &embeddings[b]) {
            (Some(x), Some(y)) => cosine_similarity(x, y),
            _ => 0.0,
        });
        let avg_trajectory_sim = pairwise_average(&cluster, |a, b| trajectory_similarity(&samples[a].trajectory, &samples[b].trajectory));
        let successes = cluster.iter().filter_map(|&idx| samples[idx].succeeded).collect::<Vec<_>>();
        let success_rate = if successes.is_empty() { 0.0 } else { successes.iter().filter(|s| **s).count() as f32 / successes.len() as f32 };

        let actions = common_actions(&samples[exemplar_idx].trajectory, &samples[cluster[cluster.len() - 1]].trajectory);
        groups.push(PatternGroup {
            experiences: cluster.iter().map(|&idx| samples[idx].id).collect(),
            exemplar: samples[exemplar_idx].id,
            embedding_similarity: avg_embedding_sim,
            trajectory_similarity: avg_trajectory_sim,
            confidence: (avg_embedding_sim + avg_trajectory_sim) / 2.0,
            suggested_pattern: actions.join(" -> "),
            common_actions: actions,
            success_rate,
        });
    }

    groups
}

fn pairwise_average(cluster: &[usize], f: impl Fn(usize, usize) -> f32) -> f32 {
    if cluster.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..cluster.len() {
        for j in (i + 1)..cluster.len() {
            total += f(cluster[i], cluster[j]);
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { total / count as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_vector::HashingEmbeddingService;

    fn sample(id: Uuid, content: &str, actions: &[&str], succeeded: bool) -> ExperienceSample {
        ExperienceSample {
            id,
            content: content.to_string(),
            trajectory: actions.iter().map(|a| TrajectoryStep { action: a.to_string(), tool: None }).collect(),
            succeeded: Some(succeeded),
        }
    }

    #[tokio::test]
    async fn clusters_similar_trajectories() {
        let embedder = HashingEmbeddingService { dim: 32 };
        let a = sample(Uuid::new_v4(), "restart the server after config change", &["stop", "edit_config", "start"], true);
        let b = sample(Uuid::new_v4(), "restart the server after config change", &["stop", "edit_config", "start"], true);
        let c = sample(Uuid::new_v4(), "deploy a brand new unrelated microservice", &["provision", "deploy", "smoke_test"], false);

        let config = PatternDetectorConfig { embedding_similarity_threshold: 0.3, trajectory_similarity_threshold: 0.5, ..Default::default() };
        let groups = detect_patterns(&[a, b, c], &embedder, &config).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].experiences.len(), 2);
        assert_eq!(groups[0].success_rate, 1.0);
    }

    #[test]
    fn trajectory_similarity_is_normalized_lcs() {
        let a = vec![TrajectoryStep { action: "a".into(), tool: None }, TrajectoryStep { action: "b".into(), tool: None }];
        let b = vec![TrajectoryStep { action: "a".into(), tool: None }, TrajectoryStep { action: "b".into(), tool: None }];
        assert_eq!(trajectory_similarity(&a, &b), 1.0);
    }
}
