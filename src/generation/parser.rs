//! Two-pass splitter turning raw model output into per-platform posts.
//!
//! The primary pass is a line scanner keyed on the exact uppercase labels. Only when it
//! recovers nothing does the fallback pass re-split the raw text on case-insensitive label
//! occurrences.

use super::{Platform, SocialPosts};

/// Split `raw` into the three platform posts. Sections that cannot be located stay empty.
pub fn parse_posts(raw: &str) -> SocialPosts {
    let posts = scan_labeled_sections(raw);
    if !posts.is_empty() {
        return posts;
    }
    split_on_labels(raw)
}

/// Primary pass: line-oriented state machine over the uppercase labels.
pub(crate) fn scan_labeled_sections(raw: &str) -> SocialPosts {
    let mut posts = SocialPosts::default();
    let mut current: Option<Platform> = None;
    let mut lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(platform) = boundary(trimmed) {
            commit(&mut posts, current, &lines);
            lines.clear();
            current = Some(platform);
        } else if current.is_some() && !trimmed.is_empty() {
            lines.push(line);
        }
    }
    commit(&mut posts, current, &lines);

    posts
}

/// Fallback pass: split before every case-insensitive label and strip the label prefix.
pub(crate) fn split_on_labels(raw: &str) -> SocialPosts {
    let mut posts = SocialPosts::default();
    // ASCII folding keeps byte offsets aligned with `raw`.
    let folded = raw.to_ascii_uppercase();

    let mut cuts: Vec<usize> = Platform::ALL
        .iter()
        .flat_map(|platform| {
            folded
                .match_indices(platform.label())
                .map(|(offset, _)| offset)
        })
        .collect();
    cuts.push(0);
    cuts.push(raw.len());
    cuts.sort_unstable();
    cuts.dedup();

    for window in cuts.windows(2) {
        let chunk = &raw[window[0]..window[1]];
        let chunk_folded = &folded[window[0]..window[1]];
        let Some(platform) = Platform::ALL
            .into_iter()
            .find(|platform| chunk_folded.starts_with(platform.label()))
        else {
            continue;
        };
        let body = chunk[platform.label().len()..].trim();
        posts.set(platform, body.to_string());
    }

    posts
}

fn boundary(trimmed: &str) -> Option<Platform> {
    Platform::ALL
        .into_iter()
        .find(|platform| trimmed.starts_with(platform.label()))
}

fn commit(posts: &mut SocialPosts, section: Option<Platform>, lines: &[&str]) {
    let Some(platform) = section else {
        return;
    };
    if !lines.is_empty() {
        posts.set(platform, lines.join("\n").trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(linkedin: &str, twitter: &str, instagram: &str) -> SocialPosts {
        SocialPosts {
            linkedin: linkedin.into(),
            twitter: twitter.into(),
            instagram: instagram.into(),
        }
    }

    #[test]
    fn exact_format_is_recovered() {
        let raw = "LINKEDIN:\nHello\n\nTWITTER:\nHi\n\nINSTAGRAM:\nHey\n";
        assert_eq!(parse_posts(raw), posts("Hello", "Hi", "Hey"));
    }

    #[test]
    fn multi_line_content_keeps_internal_newlines() {
        let raw = "Here you go!\n\n  LINKEDIN:\n  Big news today.\nJoin us #AI\n\nTWITTER:\nShort take #AI\nINSTAGRAM:\nPicture this\n\n#fun #ai\n";
        let parsed = parse_posts(raw);
        assert_eq!(parsed.linkedin, "Big news today.\nJoin us #AI");
        assert_eq!(parsed.twitter, "Short take #AI");
        // Blank lines inside a section are dropped by the scanner.
        assert_eq!(parsed.instagram, "Picture this\n#fun #ai");
    }

    #[test]
    fn missing_section_stays_empty() {
        let raw = "LINKEDIN:\nOnly linkedin\n\nINSTAGRAM:\n\n";
        assert_eq!(parse_posts(raw), posts("Only linkedin", "", ""));
    }

    #[test]
    fn repeated_empty_label_keeps_earlier_content() {
        let raw = "TWITTER:\nfirst\nLINKEDIN:\nTWITTER:\n";
        assert_eq!(parse_posts(raw), posts("", "first", ""));
    }

    #[test]
    fn text_after_label_on_boundary_line_is_ignored_by_primary_pass() {
        let raw = "LINKEDIN: inline\nbody\nTWITTER:\ntweet\n";
        assert_eq!(parse_posts(raw), posts("body", "tweet", ""));
    }

    #[test]
    fn lowercase_labels_use_fallback() {
        let raw = "Linkedin:\nHello\n\ntwitter:\nHi\n\nInstagram: Hey";
        assert_eq!(scan_labeled_sections(raw), SocialPosts::default());
        assert_eq!(parse_posts(raw), posts("Hello", "Hi", "Hey"));
    }

    #[test]
    fn single_line_output_uses_fallback() {
        let raw = "LINKEDIN: Launch day! TWITTER: We shipped. INSTAGRAM: Party pics";
        assert_eq!(
            parse_posts(raw),
            posts("Launch day!", "We shipped.", "Party pics")
        );
    }

    #[test]
    fn fallback_ignores_preamble_and_unlabeled_text() {
        let raw = "Sure! Posts below.\nlinkedin:\nPro post";
        assert_eq!(parse_posts(raw), posts("Pro post", "", ""));
        assert_eq!(parse_posts("no labels at all"), SocialPosts::default());
        assert_eq!(parse_posts(""), SocialPosts::default());
    }

    #[test]
    fn fallback_later_chunk_overwrites_earlier_one() {
        let raw = "twitter: one linkedin: pro twitter: two";
        assert_eq!(parse_posts(raw), posts("pro", "two", ""));
    }
}
