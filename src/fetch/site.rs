use url::Url;

/// Hosts that get dedicated header evasion and the browser-cookie fallback
pub const PRIMARY_DOMAINS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "m.youtube.com",
    "music.youtube.com",
];

/// Second-level labels that are part of a public suffix (`bbc.co.uk`)
const COMPOUND_SUFFIXES: [&str; 7] = ["co", "com", "org", "net", "ac", "gov", "edu"];

/// Subdomain prefixes dropped before picking the site label
const IGNORED_PREFIXES: [&str; 4] = ["www", "m", "music", "mobile"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// The platform with anti-bot handling and credential fallback
    Primary,
    Generic,
}

impl Site {
    pub fn classify(url: &Url) -> Self {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return Site::Generic,
        };

        let is_primary = PRIMARY_DOMAINS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));

        if is_primary {
            Site::Primary
        } else {
            Site::Generic
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Site::Primary)
    }
}

/// Normalized site name used to organize downloads on disk.
///
/// `music.youtube.com` -> `youtube`, `news.bbc.co.uk` -> `bbc`,
/// `youtu.be` -> `youtube`. IP hosts keep their address with dashes.
pub fn site_slug(url: &Url) -> String {
    let host = match url.host() {
        Some(url::Host::Domain(d)) => d.to_ascii_lowercase(),
        Some(url::Host::Ipv4(ip)) => return ip.to_string().replace('.', "-"),
        Some(url::Host::Ipv6(ip)) => return ip.to_string().replace(':', "-"),
        None => return "unknown".to_string(),
    };

    let mut labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    while labels.len() > 2 && IGNORED_PREFIXES.contains(&labels[0]) {
        labels.remove(0);
    }

    let label = match labels.len() {
        0 => "unknown",
        1 => labels[0],
        n => {
            let second = labels[n - 2];
            let tld = labels[n - 1];
            if n >= 3 && tld.len() == 2 && COMPOUND_SUFFIXES.contains(&second) {
                labels[n - 3]
            } else {
                second
            }
        }
    };

    match label {
        "youtu" => "youtube".to_string(),
        other => other.to_string(),
    }
}
