use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::loader::Loader;
use crate::matches::Match;

/// Why a URL is on the candidate list, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    AdFree,
    Dai,
    Provided,
    Guessed,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub url: String,
    pub kind: CandidateKind,
    /// Whether `url` passed an existence check.
    pub verified: bool,
    pub candidates: Vec<Candidate>,
}

/// Picks the stream URL to hand to the player for a match.
pub struct StreamResolver {
    config: ResolverConfig,
    loader: Arc<dyn Loader>,
}

impl StreamResolver {
    pub fn new(config: ResolverConfig, loader: Arc<dyn Loader>) -> Self {
        Self { config, loader }
    }

    /// Candidates in priority order, blanks skipped and duplicates removed.
    /// At most one demo video is included, chosen at random.
    pub fn candidates(&self, m: &Match) -> Vec<Candidate> {
        let guessed = self
            .config
            .url_template
            .as_ref()
            .map(|t| t.replace("{id}", &m.id));
        let demo = self.config.demo_urls.choose(&mut rand::thread_rng()).cloned();

        let ordered = [
            (CandidateKind::AdFree, m.ad_free_url.clone()),
            (CandidateKind::Dai, m.dai_url.clone()),
            (CandidateKind::Provided, m.stream_url.clone()),
            (CandidateKind::Guessed, guessed),
            (CandidateKind::Demo, demo),
        ];

        let mut out: Vec<Candidate> = Vec::new();
        for (kind, url) in ordered {
            let Some(url) = url else { continue };
            let url = url.trim();
            if url.is_empty() || out.iter().any(|c| c.url == url) {
                continue;
            }
            out.push(Candidate {
                kind,
                url: url.to_string(),
            });
        }
        out
    }

    /// Chooses one URL for `m`, or `None` when there is nothing to try.
    ///
    /// With probing on, the first non-demo candidate that answers an
    /// existence check wins; the demo pick is the fallback when none does.
    pub async fn resolve(&self, m: &Match) -> Option<Resolution> {
        let candidates = self.candidates(m);
        let first = candidates.first()?.clone();

        if !self.config.probe {
            return Some(Resolution {
                url: first.url,
                kind: first.kind,
                verified: false,
                candidates,
            });
        }

        for candidate in candidates.iter().filter(|c| c.kind != CandidateKind::Demo) {
            if self.check(&candidate.url).await {
                info!(match_id = %m.id, kind = ?candidate.kind, url = %candidate.url, "Resolved stream");
                return Some(Resolution {
                    url: candidate.url.clone(),
                    kind: candidate.kind,
                    verified: true,
                    candidates: candidates.clone(),
                });
            }
        }

        let fallback = candidates
            .iter()
            .find(|c| c.kind == CandidateKind::Demo)
            .cloned()
            .unwrap_or(first);
        warn!(match_id = %m.id, url = %fallback.url, "No candidate verified, using fallback");
        Some(Resolution {
            url: fallback.url,
            kind: fallback.kind,
            verified: false,
            candidates,
        })
    }

    async fn check(&self, url: &str) -> bool {
        match tokio::time::timeout(self.config.probe_timeout, self.loader.probe(url)).await {
            Ok(Ok(info)) => {
                debug!(url, status = info.status, "Probe ok");
                true
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(url, "Probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, ProbeInfo};
    use crate::matches::mock::mock_matches;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;

    /// Probes succeed only for the listed URLs; `slow` URLs never answer.
    struct ProbeSet {
        ok: HashSet<String>,
        slow: HashSet<String>,
    }

    #[async_trait]
    impl Loader for ProbeSet {
        async fn load(&self, uri: &str) -> Result<String, LoadError> {
            Err(LoadError::Network {
                url: uri.into(),
                reason: "unused".into(),
                is_last_retry: true,
            })
        }

        async fn probe(&self, uri: &str) -> Result<ProbeInfo, LoadError> {
            if self.slow.contains(uri) {
                std::future::pending::<()>().await;
            }
            if self.ok.contains(uri) {
                Ok(ProbeInfo {
                    status: 200,
                    content_type: None,
                })
            } else {
                Err(LoadError::Http {
                    url: uri.into(),
                    status: 404,
                    message: "Not Found".into(),
                    is_last_retry: true,
                })
            }
        }
    }

    fn resolver(config: ResolverConfig, ok: &[&str], slow: &[&str]) -> StreamResolver {
        let loader = Arc::new(ProbeSet {
            ok: ok.iter().map(|s| s.to_string()).collect(),
            slow: slow.iter().map(|s| s.to_string()).collect(),
        });
        StreamResolver::new(config, loader)
    }

    fn full_match() -> Match {
        let mut m = mock_matches(Utc::now()).remove(0);
        m.ad_free_url = Some("https://adfree/live.m3u8".into());
        m.dai_url = Some("https://dai/live.m3u8".into());
        m.stream_url = Some("https://cdn/live.m3u8".into());
        m
    }

    #[test]
    fn candidate_priority() {
        let r = resolver(
            ResolverConfig::default()
                .with_url_template("https://guess/{id}/index.m3u8")
                .with_demo_urls(vec!["https://demo/a.mp4".into()]),
            &[],
            &[],
        );
        let kinds: Vec<CandidateKind> = r.candidates(&full_match()).iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CandidateKind::AdFree,
                CandidateKind::Dai,
                CandidateKind::Provided,
                CandidateKind::Guessed,
                CandidateKind::Demo
            ]
        );
        assert_eq!(r.candidates(&full_match())[3].url, "https://guess/mock-1/index.m3u8");
    }

    #[test]
    fn blanks_and_duplicates_skipped() {
        let r = resolver(ResolverConfig::default(), &[], &[]);
        let mut m = full_match();
        m.ad_free_url = Some("  ".into());
        m.dai_url = Some("https://cdn/live.m3u8".into());
        let c = r.candidates(&m);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].kind, CandidateKind::Dai);
    }

    #[tokio::test]
    async fn first_verified_candidate_wins() {
        let r = resolver(ResolverConfig::default(), &["https://cdn/live.m3u8"], &[]);
        let res = r.resolve(&full_match()).await.unwrap();
        assert_eq!(res.kind, CandidateKind::Provided);
        assert!(res.verified);
    }

    #[tokio::test]
    async fn probe_timeout_moves_on() {
        let r = resolver(
            ResolverConfig::default().with_probe_timeout(20),
            &["https://dai/live.m3u8"],
            &["https://adfree/live.m3u8"],
        );
        let res = r.resolve(&full_match()).await.unwrap();
        assert_eq!(res.kind, CandidateKind::Dai);
    }

    #[tokio::test]
    async fn demo_used_when_nothing_verifies() {
        let r = resolver(
            ResolverConfig::default().with_demo_urls(vec!["https://demo/a.mp4".into()]),
            &[],
            &[],
        );
        let res = r.resolve(&full_match()).await.unwrap();
        assert_eq!(res.kind, CandidateKind::Demo);
        assert!(!res.verified);
    }

    #[tokio::test]
    async fn without_probe_first_candidate_is_returned() {
        let r = resolver(ResolverConfig::default().with_probe(false), &[], &[]);
        let res = r.resolve(&full_match()).await.unwrap();
        assert_eq!(res.kind, CandidateKind::AdFree);
        assert!(!res.verified);
    }

    #[tokio::test]
    async fn nothing_to_resolve() {
        let r = resolver(ResolverConfig::default(), &[], &[]);
        let m = mock_matches(Utc::now()).remove(0);
        assert!(r.resolve(&m).await.is_none());
    }

    #[tokio::test]
    async fn unverified_first_candidate_when_no_demo() {
        let r = resolver(ResolverConfig::default().with_probe_timeout(50), &[], &[]);
        let res = r.resolve(&full_match()).await.unwrap();
        assert_eq!(res.kind, CandidateKind::AdFree);
        assert!(!res.verified);
    }
}
