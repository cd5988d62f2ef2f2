use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::errors::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CigarOp {
    Match,
    Ins,
    Del,
    RefSkip,
    SoftClip,
    HardClip,
    Pad,
    Equal,
    Diff,
}

impl CigarOp {
    pub fn from_char(c: char) -> Option<Self> {
        let op = match c {
            'M' => CigarOp::Match,
            'I' => CigarOp::Ins,
            'D' => CigarOp::Del,
            'N' => CigarOp::RefSkip,
            'S' => CigarOp::SoftClip,
            'H' => CigarOp::HardClip,
            'P' => CigarOp::Pad,
            '=' => CigarOp::Equal,
            'X' => CigarOp::Diff,
            _ => return None,
        };

        Some(op)
    }

    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
            CigarOp::RefSkip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Pad => 'P',
            CigarOp::Equal => '=',
            CigarOp::Diff => 'X',
        }
    }

    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Del | CigarOp::RefSkip | CigarOp::Equal | CigarOp::Diff
        )
    }

    pub fn consumes_query(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Ins | CigarOp::SoftClip | CigarOp::Equal | CigarOp::Diff
        )
    }

    /// Operations that neither align bases nor clip them: they never move a position.
    fn is_positional_no_op(&self) -> bool {
        matches!(self, CigarOp::HardClip | CigarOp::Pad)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CigarElement {
    pub len: u32,
    pub op: CigarOp,
}

/// An alignment shape: ordered `(length, operation)` pairs as written in SAM text form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cigar(Vec<CigarElement>);

impl Cigar {
    pub fn new(elements: Vec<CigarElement>) -> Self {
        Self(elements)
    }

    pub fn elements(&self) -> &[CigarElement] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reference bases covered by the alignment.
    pub fn reference_length(&self) -> i64 {
        self.0
            .iter()
            .filter(|e| e.op.consumes_reference())
            .map(|e| e.len as i64)
            .sum()
    }

    /// Number of read bases described by the cigar.
    pub fn query_length(&self) -> i64 {
        self.0
            .iter()
            .filter(|e| e.op.consumes_query())
            .map(|e| e.len as i64)
            .sum()
    }

    /// Soft clipped bases before the first aligned base. Hard clips and padding are skipped.
    pub fn leading_soft_clip(&self) -> i64 {
        Self::soft_clip_run(self.0.iter())
    }

    /// Soft clipped bases after the last aligned base. Hard clips and padding are skipped.
    pub fn trailing_soft_clip(&self) -> i64 {
        Self::soft_clip_run(self.0.iter().rev())
    }

    fn soft_clip_run<'a>(elements: impl Iterator<Item = &'a CigarElement>) -> i64 {
        let mut clipped = 0;
        for e in elements {
            match e.op {
                CigarOp::SoftClip => clipped += e.len as i64,
                op if op.is_positional_no_op() || e.len == 0 => {}
                _ => break,
            }
        }

        clipped
    }
}

impl FromStr for Cigar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "*" {
            return Ok(Cigar::default());
        }

        let invalid = |reason: &str| Error::InvalidCigar {
            cigar: s.to_string(),
            reason: reason.to_string(),
        };

        let mut elements = Vec::new();
        let mut len: Option<u32> = None;

        for c in s.chars() {
            if let Some(d) = c.to_digit(10) {
                let cur = len.unwrap_or(0);
                len = Some(
                    cur.checked_mul(10)
                        .and_then(|v| v.checked_add(d))
                        .ok_or_else(|| invalid("operation length overflows"))?,
                );
            } else {
                let op = CigarOp::from_char(c)
                    .ok_or_else(|| invalid(&format!("unknown operation '{}'", c)))?;
                let len = len
                    .take()
                    .ok_or_else(|| invalid(&format!("operation '{}' has no length", c)))?;

                elements.push(CigarElement { len, op });
            }
        }

        if len.is_some() {
            return Err(invalid("trailing length without an operation"));
        }

        Ok(Cigar(elements))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "*");
        }

        for e in &self.0 {
            write!(f, "{}{}", e.len, e.op.as_char())?;
        }

        Ok(())
    }
}

impl Serialize for Cigar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cigar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
