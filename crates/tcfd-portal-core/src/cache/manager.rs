use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::{FinancialData, MaterialityIssue, TcfdStandard};

/// Consider cache stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

const STANDARDS_CACHE: &str = "standards";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            // 1h 30m+ rounds up to 2h
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// Longest readable prefix kept in a company cache file name.
const COMPANY_SLUG_CHARS: usize = 40;

/// Company names become part of a file name: a readable slug followed by a
/// hash of the exact trimmed name, so distinct names never share an entry.
fn company_key(company_name: &str) -> String {
    let name = company_name.trim();
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(COMPANY_SLUG_CHARS)
        .collect();
    let slug = slug.trim_matches('_');

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("{}-{}", slug, &digest[..16])
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        debug!(cache = name, "Cache saved");
        Ok(())
    }

    // ===== TCFD Standards =====

    pub fn load_standards(&self) -> Result<Option<CachedData<Vec<TcfdStandard>>>> {
        self.load(STANDARDS_CACHE)
    }

    pub fn save_standards(&self, standards: &[TcfdStandard]) -> Result<()> {
        self.save(STANDARDS_CACHE, &standards)
    }

    // ===== Financial Data =====

    pub fn load_financial_data(
        &self,
        company_name: &str,
    ) -> Result<Option<CachedData<FinancialData>>> {
        self.load(&format!("financial_{}", company_key(company_name)))
    }

    pub fn save_financial_data(&self, company_name: &str, data: &FinancialData) -> Result<()> {
        self.save(&format!("financial_{}", company_key(company_name)), data)
    }

    // ===== Materiality =====

    pub fn load_materiality(
        &self,
        company_name: &str,
    ) -> Result<Option<CachedData<Vec<MaterialityIssue>>>> {
        self.load(&format!("materiality_{}", company_key(company_name)))
    }

    pub fn save_materiality(&self, company_name: &str, issues: &[MaterialityIssue]) -> Result<()> {
        self.save(&format!("materiality_{}", company_key(company_name)), &issues)
    }

    /// Remove every cached file. Used on logout so company data does not
    /// outlive the session that fetched it.
    pub fn clear(&self) -> Result<()> {
        let entries = match std::fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).context("Failed to read cache directory"),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        debug!("Cache cleared");
        Ok(())
    }

    // ===== Cache Age Information =====

    /// Helper to load cache and log errors without failing
    fn load_age<T>(
        &self,
        name: &str,
        loader: impl FnOnce() -> Result<Option<CachedData<T>>>,
    ) -> Option<String> {
        match loader() {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    /// Ages of the standards cache and of the entries for the companies
    /// currently shown on the financial and materiality pages.
    pub fn get_cache_ages(
        &self,
        financial_company: Option<&str>,
        materiality_company: Option<&str>,
    ) -> CacheAges {
        let named = |c: &&str| !c.trim().is_empty();
        CacheAges {
            standards: self.load_age(STANDARDS_CACHE, || self.load_standards()),
            financial: financial_company
                .filter(named)
                .and_then(|c| self.load_age("financial", || self.load_financial_data(c))),
            materiality: materiality_company
                .filter(named)
                .and_then(|c| self.load_age("materiality", || self.load_materiality(c))),
        }
    }

    /// True when standards are missing, unreadable or older than an hour.
    pub fn standards_stale(&self) -> bool {
        match self.load_standards() {
            Ok(Some(cached)) => cached.is_stale(),
            Ok(None) => true,
            Err(e) => {
                debug!(error = %e, "Failed to load standards cache for staleness check");
                true
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheAges {
    pub standards: Option<String>,
    pub financial: Option<String>,
    pub materiality: Option<String>,
}

impl CacheAges {
    pub fn standards_age(&self) -> String {
        self.standards.clone().unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TcfdCategory;
    use chrono::Duration;
    use tempfile::TempDir;

    fn standard(id: &str) -> TcfdStandard {
        TcfdStandard {
            category: TcfdCategory::Governance,
            disclosure_id: id.to_string(),
            disclosure_summary: None,
            description: None,
            reference: None,
        }
    }

    #[test]
    fn test_cached_data_age_display() {
        let mut cached = CachedData::new(vec![1]);
        assert_eq!(cached.age_display(), "just now");

        cached.cached_at = Utc::now() - Duration::minutes(5);
        assert_eq!(cached.age_display(), "5m ago");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::hours(30);
        assert_eq!(cached.age_display(), "1d ago");

        // Clock skew
        cached.cached_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale());
    }

    #[test]
    fn test_standards_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();
        assert!(cache.load_standards().unwrap().is_none());
        assert!(cache.standards_stale());

        cache.save_standards(&[standard("G-1"), standard("G-2")]).unwrap();
        let loaded = cache.load_standards().unwrap().unwrap();
        assert_eq!(loaded.data.len(), 2);
        assert_eq!(loaded.data[1].disclosure_id, "G-2");
        assert!(!cache.standards_stale());
        assert_eq!(cache.get_cache_ages(None, None).standards_age(), "just now");
    }

    #[test]
    fn test_company_entries_are_keyed_by_name() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();

        let data: FinancialData =
            serde_json::from_value(serde_json::json!({"income": [{"year": 2023}]})).unwrap();
        cache.save_financial_data("Acme Corp", &data).unwrap();

        // Surrounding space is not part of the name
        assert!(cache.load_financial_data(" Acme Corp ").unwrap().is_some());
        assert!(cache.load_financial_data("Other").unwrap().is_none());

        let ages = cache.get_cache_ages(Some("Acme Corp"), None);
        assert_eq!(ages.financial.as_deref(), Some("just now"));
        assert!(ages.materiality.is_none());
        assert_eq!(ages.standards_age(), "never");
    }

    #[test]
    fn test_similar_company_names_do_not_share_entries() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        let issue = MaterialityIssue {
            category: "Environment".to_string(),
            issue: "Acme Corp water".to_string(),
            impact_score: Some(4.0),
            financial_score: None,
            description: None,
        };
        cache.save_materiality("Acme Corp", &[issue]).unwrap();

        for other in ["Acme-Corp", "acme/corp", "acme corp", "ACME CORP"] {
            assert!(
                cache.load_materiality(other).unwrap().is_none(),
                "{} loaded the Acme Corp entry",
                other
            );
        }
        let loaded = cache.load_materiality("Acme Corp").unwrap().unwrap();
        assert_eq!(loaded.data[0].issue, "Acme Corp water");
    }

    #[test]
    fn test_company_key_is_filename_safe() {
        let key = company_key("Acme/../Corp");
        assert!(key.starts_with("acme____corp-"));
        assert!(!key.contains('/') && !key.contains('.'));
        assert!(company_key("삼성전자").starts_with("삼성전자-"));
        assert_ne!(company_key("Acme/Corp"), company_key("Acme-Corp"));

        let long = "x".repeat(500);
        assert!(company_key(&long).chars().count() <= COMPANY_SLUG_CHARS + 17);
    }

    #[test]
    fn test_clear_removes_cached_files() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache.save_standards(&[standard("G-1")]).unwrap();
        cache.save_materiality("Acme", &[]).unwrap();

        cache.clear().unwrap();
        assert!(cache.load_standards().unwrap().is_none());
        assert!(cache.load_materiality("Acme").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_cache_reports_error_and_counts_as_stale() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("standards.json"), "not json").unwrap();

        assert!(cache.load_standards().is_err());
        assert!(cache.standards_stale());
        assert!(cache.get_cache_ages(None, None).standards.is_none());
    }
}
