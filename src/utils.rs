use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

pub trait StringExt {
    fn to_url(&self) -> Result<Url, url::ParseError>;
}

impl StringExt for String {
    fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self)
    }
}

pub struct Utils;

impl Utils {
    /// `"the-wall"` becomes `"The Wall"`.
    pub fn album_title(alias: &str) -> String {
        alias
            .replace('-', " ")
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Link written onto an NFC tag to play an album.
    pub fn play_link(public_url: &str, alias: &str) -> String {
        format!(
            "{}/play?album={}",
            public_url.trim_end_matches('/'),
            utf8_percent_encode(alias, NON_ALPHANUMERIC)
        )
    }

    pub fn escape_html(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#039;"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_title_capitalizes_words() {
        assert_eq!(Utils::album_title("the-wall"), "The Wall");
        assert_eq!(Utils::album_title("doolittle"), "Doolittle");
        assert_eq!(Utils::album_title("ok computer"), "Ok Computer");
    }

    #[test]
    fn play_link_encodes_alias() {
        assert_eq!(
            Utils::play_link("https://box.example/", "the wall"),
            "https://box.example/play?album=the%20wall"
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            Utils::escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }
}
