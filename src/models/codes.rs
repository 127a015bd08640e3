//! ENTSO-E wire code enumerations
//!
//! Every enumeration is a closed set. Each variant has a stable wire code and a
//! description, and reverse lookup goes through a lazily built hash index so
//! an unknown code is reported as an error instead of falling back to a scan.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A wire code that is not part of the closed set for its type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} code '{code}'")]
pub struct UnknownCodeError {
    pub kind: &'static str,
    pub code: String,
}

macro_rules! wire_code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($code:literal, $description:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire code as it appears in requests and documents
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $($name::$variant => $description),+
                }
            }

            pub fn from_code(code: &str) -> Result<Self, UnknownCodeError> {
                lazy_static::lazy_static! {
                    static ref INDEX: std::collections::HashMap<&'static str, $name> =
                        $name::ALL.iter().map(|v| (v.code(), *v)).collect();
                }

                INDEX.get(code).copied().ok_or_else(|| UnknownCodeError {
                    kind: $kind,
                    code: code.to_string(),
                })
            }
        }

        impl FromStr for $name {
            type Err = UnknownCodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s.trim())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

wire_code_enum! {
    /// `documentType` / document `type`
    DocumentType, "document type" {
        FinalisedSchedule => ("A09", "Finalised schedule"),
        AggregatedEnergyDataReport => ("A11", "Aggregated energy data report"),
        AllocationResult => ("A25", "Allocation result document"),
        PriceDocument => ("A44", "Price Document"),
        EstimatedNetTransferCapacity => ("A61", "Estimated Net Transfer Capacity"),
        SystemTotalLoad => ("A65", "System total load"),
        InstalledGenerationPerType => ("A68", "Installed generation per type"),
        WindAndSolarForecast => ("A69", "Wind and solar forecast"),
        LoadForecastMargin => ("A70", "Load forecast margin"),
        GenerationForecast => ("A71", "Generation forecast"),
        ActualGeneration => ("A73", "Actual generation"),
        ActualGenerationPerType => ("A75", "Actual generation per type"),
    }
}

wire_code_enum! {
    /// `processType` / `process.processType`
    ProcessType, "process type" {
        DayAhead => ("A01", "Day ahead"),
        IntradayIncremental => ("A02", "Intra day incremental"),
        Realised => ("A16", "Realised"),
        IntradayTotal => ("A18", "Intraday total"),
        WeekAhead => ("A31", "Week ahead"),
        MonthAhead => ("A32", "Month ahead"),
        YearAhead => ("A33", "Year ahead"),
        Synchronisation => ("A39", "Synchronisation process"),
        Intraday => ("A40", "Intraday process"),
    }
}

wire_code_enum! {
    /// `businessType` of a request or a TimeSeries
    BusinessType, "business type" {
        Production => ("A01", "Production"),
        Consumption => ("A04", "Consumption"),
        GeneralCapacityInformation => ("A25", "General Capacity Information"),
        MinimumPossible => ("A60", "Minimum possible"),
        MaximumAvailable => ("A61", "Maximum available"),
        SpotPrice => ("A62", "Spot price"),
        EnergyFlow => ("A66", "Energy flow"),
        ForecastMargin => ("A91", "Forecast margin"),
        CongestionIncome => ("B10", "Congestion income"),
        ProductionUnit => ("B11", "Production unit"),
    }
}

wire_code_enum! {
    /// `curveType` of a TimeSeries
    CurveType, "curve type" {
        SequentialFixedSizeBlock => ("A01", "Sequential fixed size block"),
        Point => ("A02", "Point"),
        VariableSizedBlock => ("A03", "Variable sized block"),
        OverlappingBreakpoint => ("A04", "Overlapping breakpoint"),
        NonOverlappingBreakpoint => ("A05", "Non-overlapping breakpoint"),
    }
}

wire_code_enum! {
    /// `marketRole.type` of a sender or receiver participant
    MarketRoleType, "market role type" {
        TradeResponsibleParty => ("A01", "Trade responsible party"),
        SystemOperator => ("A04", "System operator"),
        MarketInformationAggregator => ("A32", "Market information aggregator"),
        InformationReceiver => ("A33", "Information receiver"),
        DataProvider => ("A39", "Data provider"),
        TransmissionCapacityAllocator => ("A49", "Transmission capacity allocator"),
    }
}

wire_code_enum! {
    /// Area type membership of an EIC area
    AreaType, "area type" {
        BiddingZone => ("BZN", "Bidding Zone"),
        BiddingZoneAggregation => ("BZA", "Bidding Zone Aggregation"),
        ControlArea => ("CTA", "Control Area"),
        MarketBalanceArea => ("MBA", "Market Balance Area"),
        SchedulingArea => ("SCA", "Scheduling Area"),
        LoadFrequencyControlArea => ("LFA", "Load Frequency Control Area"),
        LoadFrequencyControlBlock => ("LFB", "Load Frequency Control Block"),
        Region => ("REG", "Region"),
        Country => ("CTY", "Country"),
        ImbalancePriceArea => ("IPA", "Imbalance Price Area"),
        SynchronousArea => ("SNA", "Synchronous Area"),
    }
}
