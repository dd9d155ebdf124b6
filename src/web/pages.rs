use crate::api::household::{Favorite, Group, Household};
use crate::favorites::AliasMap;
use crate::utils::Utils;

const FAVORITES_STYLE: &str = r#"
        body { font-family: sans-serif; max-width: 800px; margin: 20px auto; padding: 0 20px; }
        h1 { text-align: center; }
        .favorite-item { border: 1px solid #ccc; border-radius: 8px; padding: 15px; margin-bottom: 15px; }
        .item-content { display: flex; align-items: center; }
        .favorite-item img { width: 80px; height: 80px; margin-right: 15px; border-radius: 4px; }
        .favorite-details { flex-grow: 1; }
        .favorite-details strong { font-size: 1.2em; }
        .favorite-details p { margin: 5px 0; color: #555; }
        .alias-input { width: 100%; padding: 8px; margin-top: 10px; border: 1px solid #ccc; border-radius: 4px; }
        .nfc-link-area { margin-top: 15px; }
        .nfc-link-input { width: calc(100% - 60px); padding: 8px; border: 1px solid #ddd; background-color: #f9f9f9; border-radius: 4px; }
        .copy-button { width: 50px; padding: 8px; margin-left: 5px; border: 1px solid #ccc; border-radius: 4px; cursor: pointer; }
        .save-button { display: block; width: 100%; padding: 15px; background-color: #28a745; color: white; font-size: 1.2em; border: none; border-radius: 8px; cursor: pointer; margin-top: 20px; }
        .saved-notice { background-color: #d4edda; color: #155724; border: 1px solid #c3e6cb; padding: 10px; border-radius: 4px; margin-bottom: 20px; text-align: center; }
"#;

const COPY_SCRIPT: &str = r#"
        function copyToClipboard(elementId) {
            const input = document.getElementById(elementId);
            navigator.clipboard.writeText(input.value).then(() => {
                alert("Copied the link!");
            }).catch(() => {
                alert("Failed to copy link.");
            });
        }
"#;

fn document(title: &str, head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{}</title>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">{}</head>\
         <body>{}</body></html>",
        Utils::escape_html(title),
        head,
        body
    )
}

/// Centered single-message page used by the jukebox endpoints.
fn notice(title: &str, heading: &str, content: &str) -> String {
    document(
        title,
        "",
        &format!(
            "<div style=\"font-family: sans-serif; text-align: center; padding-top: 50px;\">\
             <h1>{}</h1>{}</div>",
            Utils::escape_html(heading),
            content
        ),
    )
}

pub fn index() -> String {
    notice(
        "Sonos Jukebox",
        "Sonos Jukebox",
        "<p><a href=\"/authorize\">Connect to Sonos</a></p>\
         <p><a href=\"/favorites\">Manage album aliases</a></p>\
         <p><a href=\"/discover\">Discover households and groups</a></p>",
    )
}

pub fn authorize(authorize_url: &str) -> String {
    document(
        "Authorize Sonos Jukebox",
        "",
        &format!(
            "<h1>Step 1: Connect to Sonos</h1>\
             <p>Click the button below to authorize this application to control your Sonos system. \
             You will be redirected to the Sonos website to log in and grant permission.</p>\
             <a href=\"{}\" style=\"display: inline-block; padding: 10px 20px; background-color: #007bff; \
             color: white; text-decoration: none; border-radius: 5px;\">Authorize with Sonos</a>",
            Utils::escape_html(authorize_url)
        ),
    )
}

pub fn authorized() -> String {
    document(
        "Authorization Successful",
        "",
        "<h1>Success!</h1>\
         <p>Your application is now authorized. The authentication tokens have been securely stored.</p>\
         <p>You can now proceed to the next setup steps.</p>",
    )
}

pub fn playing(player: &str, album_title: &str) -> String {
    notice(
        "Sonos Jukebox",
        &format!("Playing on {}", player),
        &format!(
            "<p style=\"font-size: 1.2em;\">{}</p>",
            Utils::escape_html(album_title)
        ),
    )
}

pub fn volume_set(player: &str, level: u8) -> String {
    notice(
        "Sonos Jukebox",
        "Volume Set",
        &format!(
            "<p style=\"font-size: 1.2em;\">Volume on {} has been set to {}%.</p>",
            Utils::escape_html(player),
            level
        ),
    )
}

pub fn error(message: &str, detail: Option<&str>) -> String {
    let detail = detail
        .map(|detail| format!("<pre>{}</pre>", Utils::escape_html(detail)))
        .unwrap_or_default();

    notice(
        "Sonos Jukebox",
        "Error",
        &format!("<p>{}</p>{}", Utils::escape_html(message), detail),
    )
}

pub fn favorites(items: &[Favorite], aliases: &AliasMap, public_url: &str, saved: bool) -> String {
    let mut body = String::from("<h1>Sonos Favorites Manager</h1>");

    if saved {
        body.push_str("<div class=\"saved-notice\">Aliases have been saved successfully!</div>");
    }

    body.push_str("<form method=\"POST\">");

    if items.is_empty() {
        body.push_str("<p>No favorites found. Please add some albums in your Sonos app first.</p>");
    } else {
        for (index, item) in items.iter().enumerate() {
            body.push_str(&favorite_item(index, item, aliases, public_url));
        }
        body.push_str("<button type=\"submit\" class=\"save-button\">Save All Aliases</button>");
    }

    body.push_str("</form>");

    document(
        "Sonos Favorites Manager",
        &format!("<style>{}</style><script>{}</script>", FAVORITES_STYLE, COPY_SCRIPT),
        &body,
    )
}

fn favorite_item(index: usize, item: &Favorite, aliases: &AliasMap, public_url: &str) -> String {
    let id = Utils::escape_html(&item.id);
    let alias = aliases.alias_for(&item.id).unwrap_or_default();

    let image = item
        .image_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .map(|url| format!("<img src=\"{}\" alt=\"Album Art\">", Utils::escape_html(url)))
        .unwrap_or_default();

    let link = if alias.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"nfc-link-area\"><strong>NFC Link:</strong><br>\
             <input type=\"text\" class=\"nfc-link-input\" value=\"{link}\" id=\"nfc-link-{index}\" readonly>\
             <button type=\"button\" class=\"copy-button\" onclick=\"copyToClipboard('nfc-link-{index}')\">Copy</button></div>",
            link = Utils::escape_html(&Utils::play_link(public_url, alias)),
            index = index
        )
    };

    format!(
        "<div class=\"favorite-item\"><div class=\"item-content\">{image}\
         <div class=\"favorite-details\"><strong>{name}</strong><p>{description}</p>\
         <p><code>ID: {id}</code></p>\
         <input type=\"text\" name=\"aliases[{id}]\" class=\"alias-input\" \
         placeholder=\"Enter a short alias (e.g. 'doolittle')\" value=\"{alias}\">\
         </div></div>{link}</div>",
        image = image,
        name = Utils::escape_html(&item.name),
        description = Utils::escape_html(&item.description),
        id = id,
        alias = Utils::escape_html(alias),
        link = link
    )
}

pub fn discover(households: &[Household], groups: &[Group]) -> String {
    let mut body = String::from("<h1>Discovery</h1><h2>Households</h2>");

    if households.is_empty() {
        body.push_str("<p>No households found for this account.</p>");
    }
    for household in households {
        body.push_str(&format!(
            "<p>Household ID: <b>{}</b></p>",
            Utils::escape_html(&household.id)
        ));
    }

    body.push_str("<h2>Groups</h2>");
    if groups.is_empty() {
        body.push_str("<p>No groups found in this household.</p>");
    }
    for group in groups {
        body.push_str(&format!(
            "<p>Name: <b>{}</b><br>Group ID: <b>{}</b></p>",
            Utils::escape_html(&group.name),
            Utils::escape_html(&group.id)
        ));
    }

    document("Sonos Discovery", "", &body)
}
