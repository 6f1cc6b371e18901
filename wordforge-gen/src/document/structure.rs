//! Markdown paragraph structure and image placement
//!
//! Placement rules: an image never lands after the final paragraph, slot 0
//! anchors to the first paragraph, and when there are more paragraphs than
//! images the slots spread at even strides. With fewer paragraphs than
//! requested images the excess piles onto a central paragraph.

/// One body paragraph with its line span in the source markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Split markdown into body paragraphs, skipping blank lines and headings.
pub fn extract_paragraphs(markdown: &str) -> Vec<Paragraph> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 0;

    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            if !current.is_empty() {
                paragraphs.push(Paragraph {
                    text: current.join("\n"),
                    start_line,
                    end_line: i - 1,
                });
                current.clear();
            }
            continue;
        }
        if current.is_empty() {
            start_line = i;
        }
        current.push(line);
    }

    if !current.is_empty() {
        paragraphs.push(Paragraph {
            text: current.join("\n"),
            start_line,
            end_line: lines.len().saturating_sub(1),
        });
    }

    paragraphs
}

/// Compute the paragraph index each requested image attaches to.
///
/// `None` entries mean "append at document end" (only produced when the
/// article has no body paragraphs at all).
pub fn compute_image_slots(para_count: usize, target: usize) -> Vec<Option<usize>> {
    if target == 0 {
        return Vec::new();
    }
    if para_count == 0 {
        return vec![None; target];
    }
    if para_count == 1 {
        return vec![Some(0); target];
    }
    if para_count == 2 {
        return match target {
            1 => vec![Some(0)],
            2 => vec![Some(0), Some(1)],
            _ => {
                let mut slots = vec![Some(0); target - 1];
                slots.push(Some(1));
                slots
            }
        };
    }

    // Three or more paragraphs.
    if para_count < target {
        let mut slots: Vec<usize> = (0..para_count - 1).collect();
        let insert_pos = std::cmp::min(para_count - 2, (para_count - 2) / 2);
        slots.extend(std::iter::repeat(insert_pos).take(target - (para_count - 1)));
        slots.sort_unstable();
        return slots.into_iter().map(Some).collect();
    }

    match target {
        1 => vec![Some(0)],
        3 => {
            if para_count == 3 {
                vec![Some(0), Some(1), Some(1)]
            } else {
                vec![Some(0), Some(para_count / 2), Some(para_count - 2)]
            }
        }
        _ => {
            let step = (para_count - 1) as f64 / target as f64;
            (0..target)
                .map(|i| Some(std::cmp::min((i as f64 * step) as usize, para_count - 2)))
                .collect()
        }
    }
}

/// Image placement directive consumed by [`inject_images`].
#[derive(Debug, Clone)]
pub struct ImagePlacement<'a> {
    pub path: &'a str,
    pub paragraph_index: Option<usize>,
}

/// Insert image references into the markdown after their target paragraphs.
///
/// Insertions run back to front so earlier line indices stay valid. Images
/// without a paragraph index are appended at the end.
pub fn inject_images(markdown: &str, images: &[ImagePlacement<'_>]) -> String {
    if images.is_empty() {
        return markdown.to_string();
    }

    let mut lines: Vec<String> = markdown.lines().map(str::to_string).collect();
    let paragraphs = extract_paragraphs(markdown);

    let mut insertions: std::collections::BTreeMap<usize, Vec<String>> =
        std::collections::BTreeMap::new();
    let mut end_insertions: Vec<String> = Vec::new();

    for image in images {
        let markup = format!("![]({})", image.path);
        match image.paragraph_index {
            Some(idx) if idx < paragraphs.len() => {
                let insert_line = paragraphs[idx].end_line + 1;
                insertions.entry(insert_line).or_default().push(markup);
            }
            _ => end_insertions.push(markup),
        }
    }

    for (line_idx, markups) in insertions.into_iter().rev() {
        let line_idx = line_idx.min(lines.len());
        for markup in markups.into_iter().rev() {
            lines.insert(line_idx, String::new());
            lines.insert(line_idx, markup);
            lines.insert(line_idx, String::new());
        }
    }

    if !end_insertions.is_empty() {
        lines.push(String::new());
        for markup in end_insertions {
            lines.push(String::new());
            lines.push(markup);
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Insert a bold placeholder notice after the first body paragraph when
/// images were requested but none resolved.
pub fn placeholder_when_no_images(markdown: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut placed = false;

    for line in markdown.lines() {
        out.push(line);
        let stripped = line.trim();
        if !placed && !stripped.is_empty() && !stripped.starts_with('#') {
            placed = true;
            out.push("");
            out.push("**Please supply an illustration for this article.**");
            out.push("");
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Title\n\nFirst paragraph line one.\nLine two.\n\n## Section\n\nSecond paragraph.\n\nThird paragraph.\n";

    #[test]
    fn paragraphs_skip_headings_and_blanks() {
        let paras = extract_paragraphs(SAMPLE);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].text, "First paragraph line one.\nLine two.");
        assert_eq!(paras[0].start_line, 2);
        assert_eq!(paras[0].end_line, 3);
        assert_eq!(paras[1].text, "Second paragraph.");
        assert_eq!(paras[2].text, "Third paragraph.");
    }

    #[test]
    fn slots_with_no_paragraphs_append_at_end() {
        assert_eq!(compute_image_slots(0, 2), vec![None, None]);
    }

    #[test]
    fn slots_single_paragraph_all_anchor_first() {
        assert_eq!(
            compute_image_slots(1, 3),
            vec![Some(0), Some(0), Some(0)]
        );
    }

    #[test]
    fn slots_two_paragraphs() {
        assert_eq!(compute_image_slots(2, 1), vec![Some(0)]);
        assert_eq!(compute_image_slots(2, 2), vec![Some(0), Some(1)]);
        assert_eq!(compute_image_slots(2, 3), vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn slots_fewer_paragraphs_than_images_fill_center() {
        // 3 paragraphs, 5 images: base slots [0, 1] plus three copies of the
        // central slot min(1, 0) = 0, sorted.
        assert_eq!(
            compute_image_slots(3, 5),
            vec![Some(0), Some(0), Some(0), Some(0), Some(1)]
        );
    }

    #[test]
    fn slots_enough_paragraphs_spread_evenly() {
        assert_eq!(compute_image_slots(8, 1), vec![Some(0)]);
        assert_eq!(compute_image_slots(3, 3), vec![Some(0), Some(1), Some(1)]);
        assert_eq!(compute_image_slots(8, 3), vec![Some(0), Some(4), Some(6)]);
        // Even-stride branch, never past the penultimate paragraph.
        assert_eq!(compute_image_slots(8, 2), vec![Some(0), Some(3)]);
    }

    #[test]
    fn slot_zero_always_first_paragraph() {
        for paras in 1..10 {
            for target in 1..4 {
                assert_eq!(compute_image_slots(paras, target)[0], Some(0));
            }
        }
    }

    #[test]
    fn injection_places_image_after_paragraph() {
        let out = inject_images(
            SAMPLE,
            &[ImagePlacement {
                path: "/tmp/a.jpg",
                paragraph_index: Some(0),
            }],
        );
        let lines: Vec<&str> = out.lines().collect();
        // After "Line two." (line 3): blank, image, blank.
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "![](/tmp/a.jpg)");
        assert_eq!(lines[6], "");
        assert!(out.contains("Second paragraph."));
    }

    #[test]
    fn injection_appends_unanchored_images() {
        let out = inject_images(
            SAMPLE,
            &[ImagePlacement {
                path: "x.png",
                paragraph_index: None,
            }],
        );
        assert!(out.trim_end().ends_with("![](x.png)"));
    }

    #[test]
    fn placeholder_lands_after_first_paragraph_line() {
        let out = placeholder_when_no_images("# T\n\nOpening line.\nMore text.\n");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], "Opening line.");
        assert_eq!(lines[4], "**Please supply an illustration for this article.**");
    }
}
