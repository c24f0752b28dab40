//! Arabic shaping and visual reordering for text drawn without a shaping engine.
//!
//! PDF text is placed glyph by glyph from left to right, so Arabic lines are
//! first mapped onto the Presentation Forms-B block (contextual forms and
//! lam-alef ligatures) and then reversed into visual order. Runs of Latin
//! letters and digits inside an Arabic line keep their reading order.

use super::layout::graphemes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

#[derive(Clone, Copy)]
enum Joining {
    /// Joins on both sides: isolated, final, initial, medial.
    Dual(u32),
    /// Joins only to the preceding letter: isolated, final.
    Right(u32),
    /// Never joins.
    None(u32),
    /// Tatweel joins on both sides but keeps its own code point.
    Causing,
}

fn joining(ch: char) -> Option<Joining> {
    use Joining::*;
    let form = match ch as u32 {
        0x0621 => None(0xFE80),
        0x0622 => Right(0xFE81),
        0x0623 => Right(0xFE83),
        0x0624 => Right(0xFE85),
        0x0625 => Right(0xFE87),
        0x0626 => Dual(0xFE89),
        0x0627 => Right(0xFE8D),
        0x0628 => Dual(0xFE8F),
        0x0629 => Right(0xFE93),
        0x062A => Dual(0xFE95),
        0x062B => Dual(0xFE99),
        0x062C => Dual(0xFE9D),
        0x062D => Dual(0xFEA1),
        0x062E => Dual(0xFEA5),
        0x062F => Right(0xFEA9),
        0x0630 => Right(0xFEAB),
        0x0631 => Right(0xFEAD),
        0x0632 => Right(0xFEAF),
        0x0633 => Dual(0xFEB1),
        0x0634 => Dual(0xFEB5),
        0x0635 => Dual(0xFEB9),
        0x0636 => Dual(0xFEBD),
        0x0637 => Dual(0xFEC1),
        0x0638 => Dual(0xFEC5),
        0x0639 => Dual(0xFEC9),
        0x063A => Dual(0xFECD),
        0x0640 => Causing,
        0x0641 => Dual(0xFED1),
        0x0642 => Dual(0xFED5),
        0x0643 => Dual(0xFED9),
        0x0644 => Dual(0xFEDD),
        0x0645 => Dual(0xFEE1),
        0x0646 => Dual(0xFEE5),
        0x0647 => Dual(0xFEE9),
        0x0648 => Right(0xFEED),
        0x0649 => Right(0xFEEF),
        0x064A => Dual(0xFEF1),
        _ => return Option::None,
    };
    Some(form)
}

fn joins_forward(joining: Joining) -> bool {
    matches!(joining, Joining::Dual(_) | Joining::Causing)
}

fn joins_backward(joining: Joining) -> bool {
    matches!(
        joining,
        Joining::Dual(_) | Joining::Right(_) | Joining::Causing
    )
}

/// Harakat and other marks that sit on a letter without breaking its joining.
fn is_transparent(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0610..=0x061A | 0x064B..=0x065F | 0x0670 | 0x06D6..=0x06DC | 0x06DF..=0x06E4
            | 0x06E7..=0x06E8 | 0x06EA..=0x06ED
    )
}

fn lam_alef(alef: char) -> Option<u32> {
    match alef {
        '\u{0622}' => Some(0xFEF5),
        '\u{0623}' => Some(0xFEF7),
        '\u{0625}' => Some(0xFEF9),
        '\u{0627}' => Some(0xFEFB),
        _ => None,
    }
}

/// Replaces Arabic letters with their contextual presentation forms.
pub fn shape_arabic(text: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let neighbor = |start: usize, step: isize| -> Option<Joining> {
        let mut index = start as isize + step;
        while index >= 0 && (index as usize) < chars.len() {
            let ch = chars[index as usize];
            if !is_transparent(ch) {
                return joining(ch);
            }
            index += step;
        }
        None
    };

    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        let Some(current) = joining(ch) else {
            out.push(ch);
            index += 1;
            continue;
        };
        let joined_before = neighbor(index, -1).is_some_and(joins_forward);

        if ch == '\u{0644}'
            && let Some(&next) = chars.get(index + 1)
            && let Some(ligature) = lam_alef(next)
        {
            let code = if joined_before { ligature + 1 } else { ligature };
            out.push(char::from_u32(code).unwrap_or(ch));
            index += 2;
            continue;
        }

        let joined_after = joins_forward(current) && neighbor(index, 1).is_some_and(joins_backward);
        let code = match current {
            Joining::Causing | Joining::None(_) => None,
            Joining::Right(base) => Some(if joined_before { base + 1 } else { base }),
            Joining::Dual(base) => Some(match (joined_before, joined_after) {
                (false, false) => base,
                (true, false) => base + 1,
                (false, true) => base + 2,
                (true, true) => base + 3,
            }),
        };
        out.push(code.and_then(char::from_u32).unwrap_or(match current {
            Joining::None(base) => char::from_u32(base).unwrap_or(ch),
            _ => ch,
        }));
        index += 1;
    }
    out
}

/// Arabic-Indic and extended Arabic-Indic digits; numbers read left to right.
fn is_arabic_digit(ch: char) -> bool {
    matches!(ch as u32, 0x0660..=0x0669 | 0x06F0..=0x06F9)
}

fn is_rtl(ch: char) -> bool {
    !is_arabic_digit(ch)
        && matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF
        )
}

fn is_ltr(ch: char) -> bool {
    !is_rtl(ch) && (ch.is_alphanumeric() || ch.is_ascii_digit())
}

pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(is_rtl)
}

/// Direction of the first strong character, `Ltr` when there is none.
pub fn base_direction(text: &str) -> Direction {
    for ch in text.chars() {
        if is_rtl(ch) {
            return Direction::Rtl;
        }
        if is_ltr(ch) {
            return Direction::Ltr;
        }
    }
    Direction::Ltr
}

fn mirror(cluster: &str) -> &str {
    match cluster {
        "(" => ")",
        ")" => "(",
        "[" => "]",
        "]" => "[",
        "{" => "}",
        "}" => "{",
        "<" => ">",
        ">" => "<",
        "«" => "»",
        "»" => "«",
        other => other,
    }
}

/// Reorders one line from logical to visual order around a base direction.
pub fn visual_order(text: &str, base: Direction) -> String {
    let clusters = graphemes(text);
    let mut strong = clusters
        .iter()
        .map(|cluster| {
            let first = cluster.chars().next().unwrap_or(' ');
            if is_rtl(first) {
                Some(Direction::Rtl)
            } else if is_ltr(first) {
                Some(Direction::Ltr)
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    // Neutrals take the direction of matching neighbours, otherwise the base.
    let snapshot = strong.clone();
    for index in 0..strong.len() {
        if strong[index].is_some() {
            continue;
        }
        let before = snapshot[..index].iter().rev().find_map(|dir| *dir);
        let after = snapshot[index + 1..].iter().find_map(|dir| *dir);
        strong[index] = Some(match (before, after) {
            (Some(a), Some(b)) if a == b => a,
            _ => base,
        });
    }

    let mut runs: Vec<(Direction, Vec<&str>)> = Vec::new();
    for (cluster, dir) in clusters.iter().zip(strong) {
        let dir = dir.unwrap_or(base);
        match runs.last_mut() {
            Some((last, items)) if *last == dir => items.push(cluster),
            _ => runs.push((dir, vec![cluster])),
        }
    }
    if base == Direction::Rtl {
        runs.reverse();
    }

    let mut out = String::with_capacity(text.len());
    for (dir, items) in runs {
        if dir == Direction::Rtl {
            for cluster in items.iter().rev() {
                out.push_str(mirror(cluster));
            }
        } else {
            for cluster in items {
                out.push_str(cluster);
            }
        }
    }
    out
}

/// Shapes and reorders a line so it can be drawn left to right.
pub fn to_visual(line: &str) -> String {
    if !contains_rtl(line) {
        return line.to_string();
    }
    visual_order(&shape_arabic(line), base_direction(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_contextual_forms() {
        // beh initial, seen medial, meem final
        assert_eq!(shape_arabic("بسم"), "\u{FE91}\u{FEB4}\u{FEE2}");
        assert_eq!(shape_arabic("ب"), "\u{FE8F}");
    }

    #[test]
    fn right_joining_letters_break_the_chain() {
        // dal joins backwards only, so the following alef is isolated
        assert_eq!(shape_arabic("دا"), "\u{FEA9}\u{FE8D}");
        assert_eq!(shape_arabic("بد"), "\u{FE91}\u{FEAA}");
    }

    #[test]
    fn lam_alef_becomes_a_ligature() {
        assert_eq!(shape_arabic("لا"), "\u{FEFB}");
        // beh + lam-alef: ligature takes its final form
        assert_eq!(shape_arabic("بلا"), "\u{FE91}\u{FEFC}");
    }

    #[test]
    fn harakat_do_not_break_joining() {
        assert_eq!(shape_arabic("بِسم"), "\u{FE91}\u{0650}\u{FEB4}\u{FEE2}");
    }

    #[test]
    fn rtl_lines_are_reversed() {
        assert_eq!(visual_order("abc", Direction::Ltr), "abc");
        assert_eq!(visual_order("ابت", Direction::Rtl), "تبا");
    }

    #[test]
    fn embedded_ltr_runs_keep_order() {
        assert_eq!(visual_order("سورة 2 آية", Direction::Rtl), "ةيآ 2 ةروس");
        assert_eq!(visual_order("في Allah Akbar هنا", Direction::Rtl), "انه Allah Akbar يف");
    }

    #[test]
    fn arabic_indic_numbers_keep_their_order() {
        assert_eq!(visual_order("آية ١٢", Direction::Rtl), "١٢ ةيآ");
        assert_eq!(visual_order("آية 12", Direction::Rtl), "12 ةيآ");
        assert_eq!(visual_order("سورة ۱۲۳ آية", Direction::Rtl), "ةيآ ۱۲۳ ةروس");
        assert!(!contains_rtl("١٢٣"));
    }

    #[test]
    fn rtl_brackets_are_mirrored() {
        assert_eq!(visual_order("(دعاء)", Direction::Rtl), "(ءاعد)");
    }

    #[test]
    fn marks_stay_with_their_letter() {
        let visual = visual_order("بِت", Direction::Rtl);
        assert_eq!(visual, "تبِ");
    }

    #[test]
    fn latin_text_is_untouched() {
        assert_eq!(to_visual("O Allah, guide me."), "O Allah, guide me.");
    }

    #[test]
    fn rtl_run_inside_latin_line() {
        assert_eq!(visual_order("file ابت.png", Direction::Ltr), "file تبا.png");
    }
}
