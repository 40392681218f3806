//! Static reference data about known platforms.

use reqwest::Url;

/// NetEase Cloud Music.
pub const NETEASE: &str = "netease";
/// QQ Music.
pub const QQ: &str = "qq";
/// Kugou.
pub const KUGOU: &str = "kugou";
/// Kuwo.
pub const KUWO: &str = "kuwo";
/// Migu.
pub const MIGU: &str = "migu";
/// 5sing.
pub const FIVESING: &str = "fivesing";
/// Jamendo.
pub const JAMENDO: &str = "jamendo";
/// JOOX.
pub const JOOX: &str = "joox";
/// Qianqian.
pub const QIANQIAN: &str = "qianqian";
/// Soda (Qishui), serves encrypted audio.
pub const SODA: &str = "soda";
/// Bilibili.
pub const BILIBILI: &str = "bilibili";
/// Plain audio file URLs.
pub const DIRECT: &str = "direct";

/// Fixed platform ordering used for every fan-out.
pub const REFERENCE_ORDER: &[&str] = &[
    NETEASE, QQ, KUGOU, KUWO, MIGU, FIVESING, JAMENDO, JOOX, QIANQIAN, SODA, BILIBILI,
];

/// Platforms left out of the default search set.
pub const DEFAULT_EXCLUDED: &[&str] = &[BILIBILI, JOOX, JAMENDO, FIVESING];

/// Platforms never used as a switch target or validated as playable.
pub const SWITCH_EXCLUDED: &[&str] = &[SODA, FIVESING];

/// Default platforms for playlist search.
pub const PLAYLIST_DEFAULT: &[&str] = &[NETEASE, QQ, KUGOU, KUWO];

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav"];

/// Kind of object an original link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Song,
    Playlist,
}

/// Whether `platform` is excluded from cross-platform switching.
pub fn is_switch_excluded(platform: &str) -> bool {
    SWITCH_EXCLUDED.contains(&platform)
}

/// Extension of a plain audio file URL, if its last path segment ends in one.
pub fn audio_extension(link: &str) -> Option<&'static str> {
    let url = Url::parse(link).ok()?;
    let file = url.path_segments()?.next_back()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS.iter().copied().find(|known| *known == ext)
}

/// Attribute a link to a platform by its host.
pub fn detect_platform(link: &str) -> Option<&'static str> {
    let rules: &[(&[&str], &str)] = &[
        (&["163.com"], NETEASE),
        (&["qq.com"], QQ),
        (&["5sing"], FIVESING),
        (&["kugou.com"], KUGOU),
        (&["kuwo.cn"], KUWO),
        (&["migu.cn"], MIGU),
        (&["bilibili.com", "b23.tv"], BILIBILI),
        (&["douyin.com", "qishui"], SODA),
        (&["jamendo.com"], JAMENDO),
    ];

    for (needles, platform) in rules {
        if needles.iter().any(|needle| link.contains(needle)) {
            return Some(platform);
        }
    }

    if link.starts_with("http") && audio_extension(link).is_some() {
        return Some(DIRECT);
    }
    None
}

/// Canonical web link for a song or playlist id, empty if there is none.
pub fn original_link(platform: &str, id: &str, kind: LinkKind) -> String {
    match (platform, kind) {
        (NETEASE, LinkKind::Playlist) => format!("https://music.163.com/#/playlist?id={}", id),
        (NETEASE, LinkKind::Song) => format!("https://music.163.com/#/song?id={}", id),
        (QQ, LinkKind::Playlist) => format!("https://y.qq.com/n/ryqq/playlist/{}", id),
        (QQ, LinkKind::Song) => format!("https://y.qq.com/n/ryqq/songDetail/{}", id),
        (KUGOU, LinkKind::Playlist) => {
            format!("https://www.kugou.com/yy/special/single/{}.html", id)
        }
        (KUGOU, LinkKind::Song) => format!("https://www.kugou.com/song/#hash={}", id),
        (KUWO, LinkKind::Playlist) => format!("http://www.kuwo.cn/playlist_detail/{}", id),
        (KUWO, LinkKind::Song) => format!("http://www.kuwo.cn/play_detail/{}", id),
        (MIGU, LinkKind::Song) => format!("https://music.migu.cn/v3/music/song/{}", id),
        (BILIBILI, _) => format!("https://www.bilibili.com/video/{}", id),
        (FIVESING, _) if id.contains('/') => format!("http://5sing.kugou.com/{}.html", id),
        (DIRECT, _) => id.to_string(),
        _ => String::new(),
    }
}

/// Human-readable label for a platform.
pub fn description(platform: &str) -> &'static str {
    match platform {
        NETEASE => "NetEase Cloud Music",
        QQ => "QQ Music",
        KUGOU => "Kugou Music",
        KUWO => "Kuwo Music",
        MIGU => "Migu Music",
        FIVESING => "5sing (original and cover works)",
        JAMENDO => "Jamendo (Creative Commons)",
        JOOX => "JOOX",
        QIANQIAN => "Qianqian Music",
        SODA => "Soda Music",
        BILIBILI => "Bilibili (user uploads)",
        DIRECT => "Direct audio file link",
        _ => "Unknown platform",
    }
}
