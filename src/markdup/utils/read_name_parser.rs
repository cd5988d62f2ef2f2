use anyhow::{anyhow, Error as AnyError};
use macro_sup::set_mlog;
use regex::Regex;

use crate::utils::errors::Error;

use super::physical_location::{PhysicalLocation, PhysicalLocationInt};

set_mlog!(stringify!(ReadNameParser));

/// Sentinel regex selecting the fast path: the last three `:` separated fields of a read name with
/// five or seven fields are parsed as tile, x and y.
pub const DEFAULT_READ_NAME_REGEX: &'static str =
    "<optimized capture of last three ':' separated fields as numeric values>";

/**
 * Parses tile, x and y out of read names so that optical duplicates can be detected for records
 * whose reader did not supply a physical location.
 */
#[derive(Debug, Clone)]
pub struct ReadNameParser {
    read_name_stored: String,
    physical_location_stored: PhysicalLocationInt,
    tmp_location_fields: [i32; 3],
    use_optimized_default_parsing: bool,
    read_name_regex: String,
    read_name_pattern: Option<Regex>,
    warned_about_regex_not_matching: bool,
}

impl Default for ReadNameParser {
    fn default() -> Self {
        Self {
            read_name_stored: String::new(),
            physical_location_stored: PhysicalLocationInt::default(),
            tmp_location_fields: [-1; 3],
            use_optimized_default_parsing: true,
            read_name_regex: DEFAULT_READ_NAME_REGEX.to_string(),
            read_name_pattern: None,
            warned_about_regex_not_matching: false,
        }
    }
}

impl ReadNameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Creates a read name parser using the given regex. The regex must have three capture groups
     * holding tile, x and y. [`DEFAULT_READ_NAME_REGEX`] selects the optimized parser.
     */
    pub fn with_regex(read_name_regex: &str) -> Result<Self, Error> {
        if read_name_regex == DEFAULT_READ_NAME_REGEX {
            return Ok(Self::new());
        }

        let pattern = Regex::new(read_name_regex).map_err(|err| {
            Error::InvalidConfiguration(format!(
                "READ_NAME_REGEX '{}' does not compile: {}",
                read_name_regex, err
            ))
        })?;

        if pattern.captures_len() < 4 {
            Err(Error::InvalidConfiguration(format!(
                "READ_NAME_REGEX '{}' must have three capture groups (tile, x, y)",
                read_name_regex
            )))?
        }

        Ok(Self {
            use_optimized_default_parsing: false,
            read_name_regex: read_name_regex.to_string(),
            read_name_pattern: Some(pattern),
            ..Default::default()
        })
    }

    /**
     * Very specialized method to rapidly parse a sequence of digits from a String up until the first
     * non-digit character.
     */
    pub(crate) fn rapid_parse_i32(input: &str) -> Result<i32, AnyError> {
        let bytes = input.as_bytes();
        let (is_negative, digits) = match bytes.first() {
            Some(b'-') => (true, &bytes[1..]),
            _ => (false, bytes),
        };

        let mut val = 0_i32;
        let mut has_digits = false;
        for b in digits.iter().take_while(|b| b.is_ascii_digit()) {
            val = val
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as i32))
                .ok_or_else(|| anyhow!("String '{}' overflows an i32.", input))?;
            has_digits = true;
        }

        if !has_digits {
            Err(anyhow!(
                "String '{}' did not start with a parsable number.",
                input
            ))?
        }

        Ok(if is_negative { -val } else { val })
    }

    /**
     * Splits the read name by the delimiter and parses the last three fields as integers into
     * `tokens`. Returns the number of fields, or -1 (with tokens set to -1) when there are fewer than three.
     */
    pub(crate) fn get_last_three_fields(
        read_name: &str,
        delim: char,
        tokens: &mut [i32; 3],
    ) -> Result<i32, AnyError> {
        let fields = read_name.split(delim).collect::<Vec<&str>>();

        if fields.len() < 3 {
            *tokens = [-1; 3];
            return Ok(-1);
        }

        let last_three = &fields[fields.len() - 3..];
        for (token, field) in tokens.iter_mut().zip(last_three) {
            *token = Self::rapid_parse_i32(field)?;
        }

        Ok(fields.len() as i32)
    }

    /**
     * Extracts tile/x/y from the read name into `loc`.
     *
     * @return true if the read name contained the information in parsable form, false otherwise
     */
    fn read_location_information(&mut self, read_name: &str, loc: &mut impl PhysicalLocation) -> bool {
        match self.try_read_location_information(read_name, loc) {
            Ok(b) => b,
            Err(err) => {
                if !self.warned_about_regex_not_matching {
                    mlog::warn!(
                        "A field parsed out of a read name was expected to contain an integer and did not. \
                        Read name: {}. Cause: {}",
                        read_name,
                        err
                    );
                    self.warned_about_regex_not_matching = true;
                }
                false
            }
        }
    }

    fn try_read_location_information(
        &mut self,
        read_name: &str,
        loc: &mut impl PhysicalLocation,
    ) -> Result<bool, AnyError> {
        if self.use_optimized_default_parsing {
            let fields =
                Self::get_last_three_fields(read_name, ':', &mut self.tmp_location_fields)?;
            if !(fields == 5 || fields == 7) {
                self.warn_once_regex_not_matching(read_name);
                return Ok(false);
            }

            loc.set_tile(i16::try_from(self.tmp_location_fields[0])?);
            loc.set_x(self.tmp_location_fields[1]);
            loc.set_y(self.tmp_location_fields[2]);
            return Ok(true);
        }

        let captures = match self.read_name_pattern.as_ref().and_then(|p| p.captures(read_name)) {
            Some(captures) => captures,
            None => {
                self.warn_once_regex_not_matching(read_name);
                return Ok(false);
            }
        };

        let group = |i: usize| {
            captures
                .get(i)
                .map(|m| m.as_str())
                .ok_or_else(|| anyhow!("capture group {} did not participate in the match", i))
        };

        loc.set_tile(group(1)?.parse::<i16>()?);
        loc.set_x(group(2)?.parse::<i32>()?);
        loc.set_y(group(3)?.parse::<i32>()?);

        Ok(true)
    }

    fn warn_once_regex_not_matching(&mut self, read_name: &str) {
        if !self.warned_about_regex_not_matching {
            mlog::warn!(
                "READ_NAME_REGEX '{}' did not match read name '{}'.  \
                You may need to specify a READ_NAME_REGEX in order to correctly identify optical duplicates.  \
                Note that this message will not be emitted again even if other read names do not match the regex.",
                self.read_name_regex,
                read_name
            );
            self.warned_about_regex_not_matching = true;
        }
    }

    /// Fills `loc` from the read name, reusing the previous result when the same name (the other
    /// end of a pair) is seen twice in a row.
    pub fn add_location_information(&mut self, read_name: &str, loc: &mut impl PhysicalLocation) -> bool {
        if read_name != self.read_name_stored {
            if self.read_location_information(read_name, loc) {
                self.read_name_stored.clear();
                self.read_name_stored.push_str(read_name);
                self.physical_location_stored.set_x(loc.get_x());
                self.physical_location_stored.set_y(loc.get_y());
                self.physical_location_stored.set_tile(loc.get_tile());
                return true;
            }
            // return false if read name cannot be parsed
            false
        } else {
            loc.set_tile(self.physical_location_stored.get_tile());
            loc.set_x(self.physical_location_stored.get_x());
            loc.set_y(self.physical_location_stored.get_y());
            true
        }
    }
}
