//! Offset-tracking text values.
//!
//! [`Text`] is what every rule step consumes and produces: a character
//! buffer, the cursor offset tracked inside it, and a validity flag. Each
//! transform returns a new value with the offset re-mapped, so a chain of
//! unwrap steps followed by wrap steps ends with the offset pointing at the
//! same logical character it started on.
//!
//! ```
//! use the_quote::text::Text;
//!
//! // cursor before the `h` of `hi`
//! let text = Text::new("say \"hi\"", 5)
//!   .escape('"', '\\')
//!   .surround("\"", "\"");
//!
//! assert_eq!(text.as_str(), r#""say \"hi\"""#);
//! assert_eq!(text.offset(), 7);
//! assert!(text.is_valid());
//! ```
//!
//! Once a step fails its shape check the value turns invalid and every later
//! step passes it through untouched. Invalid text must never be committed.
//!
//! All offsets and lengths are counted in `char`s.

use regex::Regex;

use crate::Tendril;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
  value:  Tendril,
  offset: usize,
  valid:  bool,
}

impl Text {
  /// Create a text tracking `offset`, clamped to the buffer length.
  pub fn new(value: &str, offset: usize) -> Self {
    let value = Tendril::from(value);
    let offset = offset.min(value.chars().count());
    Self {
      value,
      offset,
      valid: true,
    }
  }

  #[inline]
  pub fn as_str(&self) -> &str {
    &self.value
  }

  #[inline]
  pub fn offset(&self) -> usize {
    self.offset
  }

  #[inline]
  pub fn is_valid(&self) -> bool {
    self.valid
  }

  pub fn len_chars(&self) -> usize {
    self.value.chars().count()
  }

  /// Mark the value as not satisfying a required shape.
  #[must_use]
  pub fn invalidate(mut self) -> Self {
    self.valid = false;
    self
  }

  /// Insert `escape` before every unescaped `ch`.
  #[must_use]
  pub fn escape(self, ch: char, escape: char) -> Self {
    if !self.valid {
      return self;
    }

    let mut value = Tendril::new();
    let mut offset = self.offset;
    let mut escaped = false;

    for (i, c) in self.value.chars().enumerate() {
      if c == escape {
        escaped = !escaped;
      } else {
        if c == ch && !escaped {
          value.push(escape);
          if i <= self.offset {
            offset += 1;
          }
        }
        escaped = false;
      }
      value.push(c);
    }

    Self {
      value,
      offset,
      valid: true,
    }
  }

  /// Drop the `escape` in front of every escaped `ch`. Any other escape
  /// sequence, `escape` doubled included, is kept verbatim.
  #[must_use]
  pub fn unescape(self, ch: char, escape: char) -> Self {
    if !self.valid {
      return self;
    }

    let mut value = Tendril::new();
    let mut offset = self.offset;
    let mut chars = self.value.chars().enumerate().peekable();

    while let Some((i, c)) = chars.next() {
      if c == escape {
        match chars.peek() {
          Some(&(_, next)) if next == ch => {
            if i < self.offset {
              offset -= 1;
            }
            continue;
          },
          Some(&(_, next)) if next == escape => {
            value.push(c);
            value.push(next);
            chars.next();
            continue;
          },
          _ => {},
        }
      }
      value.push(c);
    }

    Self {
      value,
      offset,
      valid: true,
    }
  }

  /// Prepend `pre` and append `post`.
  #[must_use]
  pub fn surround(self, pre: &str, post: &str) -> Self {
    if !self.valid {
      return self;
    }

    let mut value = Tendril::from(pre);
    value.push_str(&self.value);
    value.push_str(post);

    Self {
      value,
      offset: self.offset + pre.chars().count(),
      valid: true,
    }
  }

  /// Strip `pre` and `post` (an empty `post` is not checked). On mismatch the
  /// buffer is left as is and the text turns invalid.
  #[must_use]
  pub fn trim(self, pre: &str, post: &str, ignore_case: bool) -> Self {
    if !self.valid {
      return self;
    }

    let len = self.len_chars();
    let pre_len = pre.chars().count();
    let post_len = post.chars().count();

    if len < pre_len + post_len
      || !chars_eq(self.value.chars(), pre.chars(), ignore_case)
      || !chars_eq(self.value.chars().rev(), post.chars().rev(), ignore_case)
    {
      return self.invalidate();
    }

    let new_len = len - pre_len - post_len;
    let mut value = Tendril::new();
    value.extend(self.value.chars().skip(pre_len).take(new_len));

    Self {
      value,
      offset: self.offset.saturating_sub(pre_len).min(new_len),
      valid: true,
    }
  }

  /// Keep the text valid only if it matches `pattern`.
  #[must_use]
  pub fn validate(mut self, pattern: &Regex) -> Self {
    if self.valid && !pattern.is_match(&self.value) {
      self.valid = false;
    }
    self
  }

  /// Replace the buffer with capture `group` of the first match of `pattern`.
  ///
  /// The offset is re-based onto the captured text, or reset to 0 when it
  /// falls outside of it.
  #[must_use]
  pub fn extract(self, pattern: &Regex, group: usize) -> Self {
    if !self.valid {
      return self;
    }

    let Some(found) = pattern.captures(&self.value).and_then(|caps| caps.get(group)) else {
      return self.invalidate();
    };

    let start = self.value.as_str()[..found.start()].chars().count();
    let len = found.as_str().chars().count();
    let offset = if (start..=start + len).contains(&self.offset) {
      self.offset - start
    } else {
      0
    };

    Self {
      value: Tendril::from(found.as_str()),
      offset,
      valid: true,
    }
  }

  /// Replace every occurrence of `from` with `to`.
  #[must_use]
  pub fn replace(self, from: &str, to: &str) -> Self {
    if !self.valid || from.is_empty() {
      return self;
    }

    let from_len = from.chars().count();
    let to_len = to.chars().count();

    let mut value = Tendril::new();
    let mut offset = self.offset;
    // byte index into the old buffer, char index into the old and new buffers
    let mut last = 0;
    let mut old_pos = 0;
    let mut new_pos = 0;

    for (at, _) in self.value.match_indices(from) {
      let gap = &self.value.as_str()[last..at];
      let gap_len = gap.chars().count();
      value.push_str(gap);
      old_pos += gap_len;
      new_pos += gap_len;

      if old_pos + from_len <= self.offset {
        offset = offset + to_len - from_len;
      } else if old_pos < self.offset {
        // the cursor sat inside the replaced text
        offset = new_pos + to_len.min(self.offset - old_pos);
      }

      value.push_str(to);
      old_pos += from_len;
      new_pos += to_len;
      last = at + from.len();
    }
    value.push_str(&self.value.as_str()[last..]);

    Self {
      value,
      offset,
      valid: true,
    }
  }
}

impl std::fmt::Display for Text {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.value)
  }
}

fn chars_eq(
  mut text: impl Iterator<Item = char>,
  mut expected: impl Iterator<Item = char>,
  ignore_case: bool,
) -> bool {
  expected.all(|e| {
    text.next().is_some_and(|c| {
      if ignore_case {
        c.to_lowercase().eq(e.to_lowercase())
      } else {
        c == e
      }
    })
  })
}
