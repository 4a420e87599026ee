use std::{cmp::Ordering, iter::Peekable, str::Chars};

/// Compares two entry names the way a reader expects pages to be ordered:
/// digit runs are compared by their numeric value so `page2` comes before `page10`.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l = take_digits(&mut left);
                let r = take_digits(&mut right);
                let ordering = compare_digit_runs(&l, &r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

// Runs may be longer than any integer type, compare them as trimmed strings instead
fn compare_digit_runs(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

pub fn sort_natural<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_ordered_by_value() {
        let mut names = vec!["page10.jpg", "page2.jpg", "page1.jpg", "Page3.jpg"];
        sort_natural(&mut names);
        assert_eq!(names, ["page1.jpg", "page2.jpg", "Page3.jpg", "page10.jpg"]);
    }

    #[test]
    fn nested_directories_sort_per_component() {
        let mut names = vec!["ch10/01.png", "ch9/02.png", "ch9/01.png"];
        sort_natural(&mut names);
        assert_eq!(names, ["ch9/01.png", "ch9/02.png", "ch10/01.png"]);
    }

    #[test]
    fn padding_does_not_change_value() {
        assert_eq!(natural_cmp("007.jpg", "7.jpg"), "007.jpg".cmp("7.jpg"));
        assert_eq!(natural_cmp("0010", "9"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
    }

    #[test]
    fn huge_runs_do_not_overflow() {
        assert_eq!(
            natural_cmp("99999999999999999999999", "100000000000000000000000"),
            Ordering::Less
        );
    }
}
