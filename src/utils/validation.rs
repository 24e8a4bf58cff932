use regex::Regex;

pub fn is_valid_username(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{2,31}$").unwrap();
    re.is_match(name)
}

/// Image names are free-form but must stay out of the key's path space.
pub fn is_valid_image_name(name: &str) -> bool {
    let re = Regex::new(r"^[^/\\]{1,128}$").unwrap();
    re.is_match(name)
}
