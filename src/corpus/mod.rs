//! Corpus Repository (C4): lazy, per-(season, type) phrase store backed
//! by CSV files on disk, with an LRU/TTL cache in front of the reads
//! (spec §4.4).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cache::MemoryCache;
use crate::domain::comment::{CommentType, PastComment};
use crate::domain::season::Season;
use crate::error::CorpusError;

const DEFAULT_CACHE_CAPACITY: usize = 12;
const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CorpusKey {
    season: Season,
    comment_type: CommentType,
}

/// Reads `<season>_<type>_enhanced100.csv` files from `dir` on demand,
/// caching parsed rows per `(season, type)` key. Construction only lists
/// the directory; no file content is read until the first query (spec
/// §4.4 "lazy").
pub struct CorpusRepository {
    dir: PathBuf,
    cache: MemoryCache<CorpusKey, Vec<PastComment>>,
}

impl CorpusRepository {
    /// Fails with [`CorpusError::CorpusNotFound`] if `dir` does not
    /// exist; otherwise succeeds without reading any file.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CorpusError> {
        Self::with_cache_params(dir, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS)
    }

    pub fn with_cache_params(
        dir: impl Into<PathBuf>,
        cache_capacity: usize,
        cache_ttl_secs: u64,
    ) -> Result<Self, CorpusError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(CorpusError::CorpusNotFound(dir.display().to_string()));
        }
        Ok(Self {
            dir,
            cache: MemoryCache::new(cache_capacity, cache_ttl_secs),
        })
    }

    fn file_path(&self, season: Season, comment_type: CommentType) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_enhanced100.csv",
            season.corpus_file_stem(),
            comment_type.corpus_file_stem()
        ))
    }

    /// Reads and normalizes one `(season, type)` file. A missing file is
    /// not an error: it returns an empty list with a warning (spec
    /// §4.4 Failure).
    async fn load(&self, season: Season, comment_type: CommentType) -> Vec<PastComment> {
        let path = self.file_path(season, comment_type);
        match read_comment_csv(&path, comment_type, season).await {
            Ok(mut rows) => {
                rows.sort_by(|a, b| b.count.cmp(&a.count));
                rows
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corpus file unreadable, returning empty list");
                Vec::new()
            }
        }
    }

    async fn get_cached(&self, season: Season, comment_type: CommentType) -> Vec<PastComment> {
        let key = CorpusKey {
            season,
            comment_type,
        };
        self.cache
            .get_or_fetch::<_, _, std::convert::Infallible>(key, || async {
                Ok(self.load(season, comment_type).await)
            })
            .await
            .unwrap_or_default()
    }

    /// Both comment types for `season`, sorted by count descending.
    pub async fn get_by_season(&self, season: Season) -> Vec<PastComment> {
        let mut combined = self.get_by_season_and_type(season, CommentType::Weather).await;
        combined.extend(self.get_by_season_and_type(season, CommentType::Advice).await);
        combined.sort_by(|a, b| b.count.cmp(&a.count));
        combined
    }

    pub async fn get_by_season_and_type(
        &self,
        season: Season,
        comment_type: CommentType,
    ) -> Vec<PastComment> {
        self.get_cached(season, comment_type).await
    }

    /// Like [`Self::get_by_season_and_type`] but drops any text present
    /// in `exclude`, truncating the remainder to `limit` (spec §4.2
    /// RetrieveCorpus).
    pub async fn get_filtered(
        &self,
        season: Season,
        comment_type: CommentType,
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Vec<PastComment> {
        let mut rows = self.get_by_season_and_type(season, comment_type).await;
        rows.retain(|c| !exclude.contains(&c.text));
        rows.truncate(limit);
        rows
    }

    /// Linear scan over `season`/`comment_type` (or all seasons/types if
    /// unspecified) for `keyword`, stopping at `limit` matches.
    pub async fn search(
        &self,
        keyword: &str,
        season: Option<Season>,
        comment_type: Option<CommentType>,
        limit: usize,
    ) -> Vec<PastComment> {
        let seasons: Vec<Season> = season.map_or_else(|| Season::all().to_vec(), |s| vec![s]);
        let types = match comment_type {
            Some(t) => vec![t],
            None => vec![CommentType::Weather, CommentType::Advice],
        };
        let keyword_lower = keyword.to_lowercase();
        let mut matches = Vec::new();
        'outer: for s in seasons {
            for t in &types {
                for comment in self.get_by_season_and_type(s, *t).await {
                    if comment.text.to_lowercase().contains(&keyword_lower) {
                        matches.push(comment);
                        if matches.len() >= limit {
                            break 'outer;
                        }
                    }
                }
            }
        }
        matches
    }

    /// Eagerly loads both comment types for `season` into the cache.
    pub async fn preload(&self, season: Season) {
        self.get_by_season_and_type(season, CommentType::Weather).await;
        self.get_by_season_and_type(season, CommentType::Advice).await;
    }

    /// Empties the LRU, forcing the next query to re-read from disk.
    pub async fn refresh_cache(&self) {
        self.cache.clear().await;
    }
}

async fn read_comment_csv(
    path: &Path,
    comment_type: CommentType,
    season: Season,
) -> Result<Vec<PastComment>, CorpusError> {
    let bytes = tokio::fs::read(path).await?;
    let text = strip_bom(&bytes);
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| CorpusError::Io(std::io::Error::other(err.to_string())))?;
        let Some(raw_text) = record.get(0) else {
            continue;
        };
        let Some(raw_count) = record.get(1) else {
            continue;
        };
        if let Some(comment) = PastComment::from_row(raw_text, raw_count, comment_type, season) {
            rows.push(comment);
        }
    }
    Ok(rows)
}

fn strip_bom(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').map_or_else(|| text.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_corpus_not_found() {
        let result = CorpusRepository::new("/nonexistent/path/for/corpus");
        assert!(matches!(result, Err(CorpusError::CorpusNotFound(_))));
    }

    #[tokio::test]
    async fn loads_and_sorts_by_count_descending() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "summer_weather_comment_enhanced100.csv",
            "weather_comment,count\n蒸し暑い一日,5\n晴れ渡る空,20\n",
        );
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let rows = repo
            .get_by_season_and_type(Season::Summer, CommentType::Weather)
            .await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].count, 20);
        assert_eq!(rows[1].count, 5);
    }

    #[tokio::test]
    async fn missing_file_returns_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let rows = repo
            .get_by_season_and_type(Season::Winter, CommentType::Advice)
            .await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "autumn_advice_enhanced100.csv",
            "advice,count\n,3\n上着を一枚,abc\n上着を一枚,7\n",
        );
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let rows = repo.get_by_season_and_type(Season::Autumn, CommentType::Advice).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 7);
    }

    #[tokio::test]
    async fn get_filtered_excludes_previous_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "spring_weather_comment_enhanced100.csv",
            "weather_comment,count\n花粉舞う午後,10\n穏やかな春の日,8\n桜日和,6\n",
        );
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let mut exclude = HashSet::new();
        exclude.insert("穏やかな春の日".to_string());
        let rows = repo
            .get_filtered(Season::Spring, CommentType::Weather, &exclude, 1)
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "花粉舞う午後");
    }

    #[tokio::test]
    async fn search_stops_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "winter_weather_comment_enhanced100.csv",
            "weather_comment,count\n雪がちらつく,3\n雪が積もる,2\n粉雪舞う,1\n",
        );
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let rows = repo
            .search("雪", Some(Season::Winter), Some(CommentType::Weather), 2)
            .await;
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn bom_prefixed_file_parses_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"weather_comment,count\n\xe6\x99\xb4\xe3\x82\x8c,4\n");
        std::fs::write(dir.path().join("summer_weather_comment_enhanced100.csv"), bytes).unwrap();
        let repo = CorpusRepository::new(dir.path()).unwrap();
        let rows = repo
            .get_by_season_and_type(Season::Summer, CommentType::Weather)
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 4);
    }
}
