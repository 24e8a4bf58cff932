// Object keys live in one flat namespace: a single bucket (or a single
// directory for the filesystem backend), no folder hierarchy.
//
//	<owner>_<asset>.<ext>          primary image
//	<owner>_<asset>_result.<ext>   detection result image
//
// The record store persists full URLs rather than keys, so the reverse
// mapping matters too: the last path segment of a stored URL, query string
// stripped, is always the key the object was stored under.

const RESULT_SUFFIX: &str = "_result";

/// Returns the primary object key for an asset,
/// (e.g. `alice_plate1.jpg`).
pub fn primary_key(owner: &str, asset: &str, ext: &str) -> String {
    format!("{}_{}{}", flatten(owner), flatten(asset), dot_ext(ext))
}

/// Returns the result object key for an asset,
/// (e.g. `alice_plate1_result.jpg`).
pub fn result_key(owner: &str, asset: &str, ext: &str) -> String {
    format!(
        "{}_{}{}{}",
        flatten(owner),
        flatten(asset),
        RESULT_SUFFIX,
        dot_ext(ext)
    )
}

/// Extension of an uploaded file's original name, without the dot.
/// `car.JPG` -> `JPG`, `noext` -> ``.
pub fn extension_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// Extension encoded in a stored URL, query string stripped. This is how
/// the extension of an already-stored object is recovered on rename.
pub fn extension_of_url(url: &str) -> &str {
    extension_of(key_from_url(url))
}

/// Returns the object key a stored URL points at: the last path segment,
/// query string stripped.
pub fn key_from_url(url: &str) -> &str {
    let url = url.split('?').next().unwrap_or(url);
    url.rsplit('/').next().unwrap_or(url)
}

fn dot_ext(ext: &str) -> String {
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{ext}")
    }
}

// A separator smuggled through a name would turn one bucket entry into a
// pseudo-directory, so key parts are always flattened.
fn flatten(part: &str) -> String {
    part.replace(['/', '\\'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic_per_owner_asset_role() {
        assert_eq!(primary_key("alice", "plate1", "jpg"), "alice_plate1.jpg");
        assert_eq!(primary_key("alice", "plate1", "jpg"), "alice_plate1.jpg");
        assert_eq!(result_key("alice", "plate1", "png"), "alice_plate1_result.png");
    }

    #[test]
    fn extension_comes_from_the_original_filename() {
        assert_eq!(extension_of("car.JPG"), "JPG");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn extension_from_url_ignores_query_and_host() {
        assert_eq!(
            extension_of_url("https://b.s3.us-east-1.amazonaws.com/alice_plate1.jpg?X-Amz-Expires=3600"),
            "jpg"
        );
        assert_eq!(extension_of_url("https://b.s3.amazonaws.com/alice_scan"), "");
    }

    #[test]
    fn key_from_url_is_the_last_segment() {
        assert_eq!(
            key_from_url("https://bucket.s3.amazonaws.com/alice_plate1.jpg?v=2"),
            "alice_plate1.jpg"
        );
        assert_eq!(key_from_url("memory://imagehub/alice_plate1.jpg"), "alice_plate1.jpg");
    }

    #[test]
    fn keys_never_contain_path_separators() {
        let key = primary_key("a/b", "c\\d", "png");
        assert!(!key.contains('/'));
        assert!(!key.contains('\\'));
    }

    #[test]
    fn extensionless_keys_have_no_trailing_dot() {
        assert_eq!(primary_key("alice", "scan", ""), "alice_scan");
        assert_eq!(result_key("alice", "scan", ""), "alice_scan_result");
    }
}
