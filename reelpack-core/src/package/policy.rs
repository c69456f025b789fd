/// Mood/category derivation for exported packages.
///
/// Playback devices group content by mood and category, but neither exists
/// in the catalog; they are derived from playlist names. Deployments can
/// swap the heuristic without touching the builder.
pub trait ExportPolicy: Send + Sync {
    fn mood(&self, playlist_name: &str) -> String;
    fn category(&self, playlist_name: &str) -> String;
}

const MOOD_KEYWORDS: &[(&str, &str)] = &[
    ("chill", "calm"),
    ("relax", "calm"),
    ("ambient", "calm"),
    ("sleep", "calm"),
    ("workout", "energetic"),
    ("gym", "energetic"),
    ("energy", "energetic"),
    ("party", "upbeat"),
    ("dance", "upbeat"),
    ("focus", "focused"),
    ("study", "focused"),
];

const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("music", "music"),
    ("concert", "music"),
    ("nature", "ambient"),
    ("ambient", "ambient"),
    ("scenery", "ambient"),
    ("workout", "fitness"),
    ("gym", "fitness"),
    ("kids", "family"),
    ("family", "family"),
];

/// Deterministic keyword matching over the lowercased playlist name.
/// First table hit wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExportPolicy;

impl ExportPolicy for DefaultExportPolicy {
    fn mood(&self, playlist_name: &str) -> String {
        lookup(MOOD_KEYWORDS, playlist_name, "neutral")
    }

    fn category(&self, playlist_name: &str) -> String {
        lookup(CATEGORY_KEYWORDS, playlist_name, "general")
    }
}

fn lookup(table: &[(&str, &str)], name: &str, fallback: &str) -> String {
    let lowered = name.to_lowercase();
    table
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, value)| value.to_string())
        .unwrap_or_else(|| fallback.to_string())
}
