use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{self, Display, Formatter};
use strum_macros::EnumString;

/// Maximum number of inputs of an AND, OR, NAND or NOR gate.
pub const MAX_GATE_INPUTS: u32 = 16;

/// The fixed catalog of device kinds, spelled the way a circuit description spells them.
///
/// # Example
/// ```
/// # use logsim::DeviceKind;
/// use std::str::FromStr;
///
/// assert_eq!(DeviceKind::from_str("NAND"), Ok(DeviceKind::Nand));
/// assert_eq!(DeviceKind::Dtype.to_string(), "DTYPE");
/// assert!(DeviceKind::from_str("nand").is_err());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, strum_macros::Display, EnumString)]
pub enum DeviceKind {
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "NAND")]
    Nand,
    #[strum(serialize = "NOR")]
    Nor,
    #[strum(serialize = "XOR")]
    Xor,
    #[strum(serialize = "NOT")]
    Not,
    #[strum(serialize = "SWITCH")]
    Switch,
    #[strum(serialize = "CLOCK")]
    Clock,
    #[strum(serialize = "DTYPE")]
    Dtype,
}

impl DeviceKind {
    /// Validates the declared parameter of a device of this kind.
    ///
    /// Returns the resulting [DeviceType] and the number of input pins it has,
    /// or the reason the parameter is out of range.
    ///
    /// - AND, OR, NAND, NOR require an input count in 1..=16.
    /// - XOR and NOT have a fixed input count, it may be restated (2 and 1 respectively).
    /// - SWITCH requires an initial state of 0 or 1.
    /// - CLOCK requires a half period of at least 1 cycle.
    /// - DTYPE takes no parameter.
    pub fn instantiate(self, parameter: Option<u32>) -> Result<(DeviceType, usize), String> {
        use DeviceKind::*;
        match (self, parameter) {
            (And, Some(n)) | (Or, Some(n)) | (Nand, Some(n)) | (Nor, Some(n)) => {
                if (1..=MAX_GATE_INPUTS).contains(&n) {
                    Ok((DeviceType::Gate(GateType::from_kind(self)), n as usize))
                } else {
                    Err(format!(
                        "{} gates take between 1 and {} inputs, got {}",
                        self, MAX_GATE_INPUTS, n
                    ))
                }
            }
            (And, None) | (Or, None) | (Nand, None) | (Nor, None) => {
                Err(format!("{} gates need an input count", self))
            }
            (Xor, None) | (Xor, Some(2)) => Ok((DeviceType::Gate(GateType::Xor), 2)),
            (Not, None) | (Not, Some(1)) => Ok((DeviceType::Gate(GateType::Not), 1)),
            (Xor, Some(n)) | (Not, Some(n)) => Err(format!(
                "{} gates have exactly {} input(s), got {}",
                self,
                if self == Xor { 2 } else { 1 },
                n
            )),
            (Switch, Some(0)) => Ok((DeviceType::Switch { initial: false }, 0)),
            (Switch, Some(1)) => Ok((DeviceType::Switch { initial: true }, 0)),
            (Switch, Some(n)) => Err(format!("switches start at 0 or 1, got {}", n)),
            (Switch, None) => Err("switches need an initial state of 0 or 1".into()),
            (Clock, Some(half_period)) if half_period >= 1 => {
                Ok((DeviceType::Clock { half_period }, 0))
            }
            (Clock, Some(n)) => Err(format!("clock half period must be at least 1, got {}", n)),
            (Clock, None) => Err("clocks need a half period".into()),
            (Dtype, None) => Ok((DeviceType::Dtype, DTYPE_INPUTS)),
            (Dtype, Some(n)) => Err(format!("DTYPE devices take no parameter, got {}", n)),
        }
    }
}

/// Enum representing the different types of combinational gates.
#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash)]
pub enum GateType {
    And,
    Or,
    Nand,
    Nor,
    Xor,
    Not,
}
impl GateType {
    fn from_kind(kind: DeviceKind) -> GateType {
        match kind {
            DeviceKind::And => GateType::And,
            DeviceKind::Or => GateType::Or,
            DeviceKind::Nand => GateType::Nand,
            DeviceKind::Nor => GateType::Nor,
            DeviceKind::Xor => GateType::Xor,
            DeviceKind::Not => GateType::Not,
            DeviceKind::Switch | DeviceKind::Clock | DeviceKind::Dtype => {
                unreachable!("{} is not a gate", kind)
            }
        }
    }

    /// Folds the state of one more input into the accumulated state `acc`.
    /// Keep in mind if the gate [is negated](GateType::is_negated) the result should be negated.
    #[inline(always)]
    fn accumulate(&self, acc: bool, b: bool) -> bool {
        match self {
            GateType::Or | GateType::Nor | GateType::Not => acc | b,
            GateType::And | GateType::Nand => acc & b,
            GateType::Xor => acc ^ b,
        }
    }

    /// Returns the value that starts the [accumulation](GateType::accumulate),
    /// the value that does not affect the result.
    #[inline(always)]
    fn init(&self) -> bool {
        matches!(self, GateType::And | GateType::Nand)
    }

    /// Returns true if the gate can ignore the rest of its inputs once a single one has a particular state.
    #[inline(always)]
    fn short_circuits(&self) -> bool {
        !matches!(self, GateType::Xor)
    }

    /// Returns true if `self` is [Not](GateType::Not), [Nor](GateType::Nor) or [Nand](GateType::Nand).
    pub fn is_negated(&self) -> bool {
        matches!(self, GateType::Nor | GateType::Nand | GateType::Not)
    }

    /// Calculates the output of the gate from the state of its inputs.
    ///
    /// # Example
    /// ```
    /// # use logsim::GateType;
    /// assert_eq!(GateType::Nand.evaluate([true, true]), false);
    /// assert_eq!(GateType::Nor.evaluate([false, false, false]), true);
    /// assert_eq!(GateType::Xor.evaluate([true, false]), true);
    /// assert_eq!(GateType::Not.evaluate([true]), false);
    /// ```
    pub fn evaluate<I: IntoIterator<Item = bool>>(&self, inputs: I) -> bool {
        let init = self.init();
        let short = !init;
        let mut acc = init;
        for input in inputs {
            acc = self.accumulate(acc, input);
            if self.short_circuits() && acc == short {
                break;
            }
        }
        if self.is_negated() {
            !acc
        } else {
            acc
        }
    }
}

/// Number of input pins of a DTYPE device.
pub(crate) const DTYPE_INPUTS: usize = 4;

/// Input pins of a DTYPE device, the discriminant is the input slot.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    EnumString,
    IntoPrimitive,
    TryFromPrimitive,
)]
pub enum DtypeInput {
    #[strum(serialize = "DATA")]
    Data = 0,
    #[strum(serialize = "CLK")]
    Clk,
    #[strum(serialize = "SET")]
    Set,
    #[strum(serialize = "CLEAR")]
    Clear,
}
impl DtypeInput {
    /// Returns the input slot of the pin.
    pub fn slot(self) -> usize {
        u8::from(self) as usize
    }
}

/// Output pins of a DTYPE device, the discriminant is the offset from the first output.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    EnumString,
    IntoPrimitive,
    TryFromPrimitive,
)]
pub enum DtypeOutput {
    #[strum(serialize = "Q")]
    Q = 0,
    #[strum(serialize = "QBAR")]
    Qbar,
}

/// Next stored value of a DTYPE on a rising clock edge.
///
/// SET wins over CLEAR, which wins over DATA.
#[inline(always)]
pub fn dtype_next(data: bool, set: bool, clear: bool) -> bool {
    if set {
        true
    } else if clear {
        false
    } else {
        data
    }
}

/// Advances a clock by one cycle.
///
/// Returns the new tick counter and whether the output phase flips.
#[inline(always)]
pub fn clock_tick(ticks: u32, half_period: u32) -> (u32, bool) {
    let ticks = ticks + 1;
    if ticks >= half_period {
        (0, true)
    } else {
        (ticks, false)
    }
}

/// A validated device: its kind and only the parameters relevant to it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DeviceType {
    Gate(GateType),
    Switch { initial: bool },
    Clock { half_period: u32 },
    Dtype,
}

impl DeviceType {
    /// Returns the catalog kind of the device.
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceType::Gate(GateType::And) => DeviceKind::And,
            DeviceType::Gate(GateType::Or) => DeviceKind::Or,
            DeviceType::Gate(GateType::Nand) => DeviceKind::Nand,
            DeviceType::Gate(GateType::Nor) => DeviceKind::Nor,
            DeviceType::Gate(GateType::Xor) => DeviceKind::Xor,
            DeviceType::Gate(GateType::Not) => DeviceKind::Not,
            DeviceType::Switch { .. } => DeviceKind::Switch,
            DeviceType::Clock { .. } => DeviceKind::Clock,
            DeviceType::Dtype => DeviceKind::Dtype,
        }
    }

    /// Returns true if the output is recomputed from the inputs during propagation.
    pub fn is_combinational(&self) -> bool {
        matches!(self, DeviceType::Gate(_))
    }

    /// Returns the number of output pins.
    pub fn output_count(&self) -> usize {
        match self {
            DeviceType::Dtype => 2,
            _ => 1,
        }
    }

    /// Resolves an output pin label to its offset from the first output of the device.
    pub(crate) fn output_offset(&self, label: Option<&str>) -> Result<usize, String> {
        match (self, label) {
            (DeviceType::Dtype, Some(label)) => label
                .parse::<DtypeOutput>()
                .map(|output| u8::from(output) as usize)
                .map_err(|_| format!("DTYPE outputs are Q and QBAR, not {}", label)),
            (DeviceType::Dtype, None) => Err("DTYPE outputs must be named Q or QBAR".into()),
            (_, None) => Ok(0),
            (ty, Some(label)) => Err(format!(
                "{} devices have a single unnamed output, not {}",
                ty.kind(),
                label
            )),
        }
    }

    /// Resolves an input pin label to its input slot.
    ///
    /// `inputs` is the declared input count of the device.
    pub(crate) fn input_slot(&self, inputs: usize, label: &str) -> Result<usize, String> {
        match self {
            DeviceType::Gate(_) => {
                let n = label
                    .strip_prefix('I')
                    .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|digits| digits.parse::<usize>().ok());
                match n {
                    Some(n) if n >= 1 && n <= inputs => Ok(n - 1),
                    Some(n) => Err(format!(
                        "{} has inputs I1 to I{}, not I{}",
                        self.kind(),
                        inputs,
                        n
                    )),
                    None => Err(format!("gate inputs are named I1 to I{}, not {}", inputs, label)),
                }
            }
            DeviceType::Dtype => label
                .parse::<DtypeInput>()
                .map(DtypeInput::slot)
                .map_err(|_| format!("DTYPE inputs are DATA, CLK, SET and CLEAR, not {}", label)),
            DeviceType::Switch { .. } | DeviceType::Clock { .. } => {
                Err(format!("{} devices have no inputs", self.kind()))
            }
        }
    }

    /// Returns the label of the input pin at `slot`.
    pub(crate) fn input_label(&self, slot: usize) -> String {
        match self {
            DeviceType::Dtype => match DtypeInput::try_from(slot as u8) {
                Ok(input) => input.to_string(),
                Err(_) => format!("#{}", slot),
            },
            _ => format!("I{}", slot + 1),
        }
    }

    /// Returns the label of the output pin at `offset`, [None] for unnamed outputs.
    pub(crate) fn output_label(&self, offset: usize) -> Option<DtypeOutput> {
        match self {
            DeviceType::Dtype => DtypeOutput::try_from(offset as u8).ok(),
            _ => None,
        }
    }
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Switch { initial } => write!(f, "SWITCH {}", *initial as u8),
            DeviceType::Clock { half_period } => write!(f, "CLOCK {}", half_period),
            ty => write!(f, "{}", ty.kind()),
        }
    }
}
