/// Join hard-wrapped template lines into paragraphs.
///
/// Templates are written wrapped at a comfortable width, but a single
/// newline renders as a line break. A lone newline becomes a space unless
/// it borders a blank line, starts a list item (`- `, `* `, `1. `) or sits
/// inside a fenced code block. Leading and trailing newlines are dropped.
pub fn remove_single_newlines(content: &str) -> String {
    let content = content.trim_matches('\n');
    let lines: Vec<&str> = content.split('\n').collect();
    let in_code = fenced_lines(&lines);

    let mut out = String::with_capacity(content.len());
    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);

        let Some(next) = lines.get(i + 1) else {
            break;
        };

        let keep_newline = line.is_empty()
            || next.is_empty()
            || starts_list_item(next)
            || in_code[i]
            || in_code[i + 1];

        out.push(if keep_newline { '\n' } else { ' ' });
    }

    out
}

fn starts_list_item(line: &str) -> bool {
    if line.starts_with("- ") || line.starts_with("* ") {
        return true;
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Marks fence lines and everything between them. Fences nest when the
/// inner one uses a different backtick run, e.g. a ```` block inside a
/// ``` spoiler.
fn fenced_lines(lines: &[&str]) -> Vec<bool> {
    let mut open: Vec<usize> = Vec::new();

    lines
        .iter()
        .map(|line| {
            let ticks = line.chars().take_while(|&c| c == '`').count();
            if ticks >= 3 {
                let closes = open.last().is_some_and(|&top| {
                    ticks >= top && line[ticks..].trim().is_empty()
                });
                if closes {
                    open.pop();
                } else {
                    open.push(ticks);
                }
                true
            } else {
                !open.is_empty()
            }
        })
        .collect()
}
