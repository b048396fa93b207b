//! F54: analog data reporting and production test registers
//!
//! The base query is 14 bytes (query 3 is two bytes wide). Query 12 only
//! exists when sense frequency control is supported. After it comes a
//! chain of optional one-byte queries, 13 through 68, each gated by a flag
//! in an earlier query. The control registers are laid out by
//! [`CONTROL_TABLE`] from those flags.

use super::{read_query_chain, QueryContext, QueryField, QueryMap, RegisterField, RegisterLayout};
use crate::pdt::FunctionDescriptor;
use synadiag_core::bits::{bit, le16};
use synadiag_core::{Result, Transport};

/// Size of the base query block including query 12
pub const BASE_QUERY_SIZE: usize = 14;

/// Control register payload bits touched by the test routines
pub mod ctrl {
    /// control 0: disable baseline relaxation
    pub const NO_RELAX: u8 = 1 << 0;
    /// control 7 / 57: carrier selection for CBC
    pub const CBC_TX_CARRIER_SELECTION: u8 = 1 << 4;
    /// control 88: carrier selection for CBC
    pub const CBC_TX_CARRIER_SELECTION_88: u8 = 1 << 5;
    /// control 17: sense frequency disabled
    pub const FREQ_DISABLE: u8 = 1 << 7;
    /// control 41: disable signal clarity
    pub const NO_SIGNAL_CLARITY: u8 = 1 << 0;
    /// control 149: global transcap CBC enable
    pub const TRANS_CBC_GLOBAL_CAP_ENABLE: u8 = 1 << 0;
    /// control 188: start production test for AMP sensors
    pub const START_PRODUCTION_TEST: u8 = 1 << 4;
}

/// Query registers of F54
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct F54Query {
    pub base: [u8; BASE_QUERY_SIZE],
    pub chain: QueryMap,
}

impl QueryContext for F54Query {
    fn chain_mut(&mut self) -> &mut QueryMap {
        &mut self.chain
    }
}

macro_rules! base_flag {
    ($($name:ident => $byte:expr, $bit:expr;)*) => {
        $(
            pub fn $name(&self) -> bool {
                bit(self.base[$byte], $bit)
            }
        )*
    };
}

macro_rules! chain_flag {
    ($($name:ident => $query:expr, $bit:expr;)*) => {
        $(
            pub fn $name(&self) -> bool {
                self.chain.flag($query, $bit)
            }
        )*
    };
}

impl F54Query {
    pub fn num_rx(&self) -> u8 {
        self.base[0]
    }

    pub fn num_tx(&self) -> u8 {
        self.base[1]
    }

    pub fn clock_rate(&self) -> u16 {
        le16(&self.base, 3)
    }

    pub fn touch_controller_family(&self) -> u8 {
        self.base[5]
    }

    pub fn curve_compensation_mode(&self) -> u8 {
        self.base[8] & 0x03
    }

    pub fn num_sensing_frequencies(&self) -> u8 {
        if self.has_sense_frequency_control() {
            self.base[13] & 0x0F
        } else {
            0
        }
    }

    fn family_0_or_1(&self) -> bool {
        matches!(self.touch_controller_family(), 0 | 1)
    }

    fn any_blank(&self) -> bool {
        self.has_h_blank() || self.has_v_blank() || self.has_long_h_blank()
    }

    base_flag! {
        // query 2
        has_baseline => 2, 2;
        has_image8 => 2, 3;
        has_image16 => 2, 6;
        // query 5
        has_pixel_touch_threshold_adjustment => 6, 0;
        // query 6
        has_sensor_assignment => 7, 0;
        has_interference_metric => 7, 1;
        has_sense_frequency_control => 7, 2;
        has_firmware_noise_mitigation => 7, 3;
        has_ctrl11 => 7, 4;
        has_two_byte_report_rate => 7, 5;
        has_one_byte_report_rate => 7, 6;
        has_relaxation_control => 7, 7;
        // query 8
        has_iir_filter => 9, 1;
        has_cmn_removal => 9, 2;
        has_cmn_maximum => 9, 3;
        has_touch_hysteresis => 9, 4;
        has_edge_compensation => 9, 5;
        has_per_frequency_noise_control => 9, 6;
        has_enhanced_stretch => 9, 7;
        // query 9
        has_force_fast_relaxation => 10, 0;
        has_multi_metric_state_machine => 10, 1;
        has_signal_clarity => 10, 2;
        has_variance_metric => 10, 3;
        has_0d_relaxation_control => 10, 4;
        has_0d_acquisition_control => 10, 5;
        has_status => 10, 6;
        has_slew_metric => 10, 7;
        // query 10
        has_h_blank => 11, 0;
        has_v_blank => 11, 1;
        has_long_h_blank => 11, 2;
        has_startup_fast_relaxation => 11, 3;
        has_esd_control => 11, 4;
        has_noise_mitigation2 => 11, 5;
        has_noise_state => 11, 6;
        has_energy_ratio_relaxation => 11, 7;
        // query 11
        has_excessive_noise_reporting => 12, 0;
        has_slew_option => 12, 1;
        has_two_overhead_bursts => 12, 2;
        has_query13 => 12, 3;
        has_one_overhead_burst => 12, 4;
        has_ctrl88 => 12, 6;
        has_query15 => 12, 7;
    }

    chain_flag! {
        // query 13
        has_ctrl86 => 13, 0;
        has_ctrl87 => 13, 1;
        has_cidim => 13, 5;
        has_noise_mitigation_enhancement => 13, 6;
        has_rail_im => 13, 7;
        // query 15
        has_ctrl90 => 15, 0;
        has_query16 => 15, 3;
        has_query20 => 15, 4;
        has_query21 => 15, 5;
        has_query22 => 15, 6;
        has_query25 => 15, 7;
        // query 16
        has_query17 => 16, 0;
        has_ctrl92 => 16, 2;
        has_ctrl93 => 16, 3;
        has_ctrl94_query18 => 16, 4;
        has_ctrl95_query19 => 16, 5;
        has_ctrl99 => 16, 6;
        has_ctrl100 => 16, 7;
        // query 21
        has_abs_rx => 21, 0;
        has_abs_tx => 21, 1;
        has_ctrl91 => 21, 2;
        has_ctrl96 => 21, 3;
        has_ctrl97 => 21, 4;
        has_ctrl98 => 21, 5;
        has_query24_data18 => 21, 7;
        // query 22
        has_packed_image => 22, 0;
        has_ctrl101 => 22, 1;
        has_query23 => 22, 3;
        has_ctrl103_query26 => 22, 4;
        has_ctrl104 => 22, 5;
        has_ctrl105 => 22, 6;
        has_query28 => 22, 7;
        // query 23
        has_ctrl102 => 23, 0;
        // query 25
        has_ctrl106 => 25, 0;
        has_ctrl107 => 25, 2;
        has_ctrl108 => 25, 3;
        has_ctrl109 => 25, 4;
        has_query27 => 25, 7;
        // query 27
        has_ctrl110 => 27, 0;
        has_ctrl111 => 27, 2;
        has_ctrl112 => 27, 3;
        has_ctrl113 => 27, 4;
        has_ctrl114 => 27, 6;
        has_query29 => 27, 7;
        // query 29
        has_ctrl115 => 29, 0;
        has_ctrl116 => 29, 4;
        has_ctrl117 => 29, 6;
        has_query30 => 29, 7;
        // query 30
        has_ctrl118 => 30, 0;
        has_ctrl119 => 30, 1;
        has_ctrl120 => 30, 2;
        has_ctrl121 => 30, 3;
        has_ctrl122_query31 => 30, 4;
        has_ctrl123 => 30, 5;
        has_ctrl124 => 30, 6;
        has_query32 => 30, 7;
        // query 32
        has_ctrl125 => 32, 0;
        has_ctrl126 => 32, 1;
        has_ctrl127 => 32, 2;
        has_query33 => 32, 4;
        has_query34 => 32, 6;
        has_query35 => 32, 7;
        // query 33
        has_ctrl128 => 33, 0;
        has_ctrl129 => 33, 1;
        has_ctrl130 => 33, 2;
        has_ctrl131 => 33, 3;
        has_ctrl132 => 33, 4;
        has_ctrl133 => 33, 5;
        has_ctrl134 => 33, 6;
        has_query36 => 33, 7;
        // query 35
        has_ctrl135 => 35, 1;
        has_ctrl136 => 35, 2;
        has_ctrl137 => 35, 3;
        has_ctrl138 => 35, 4;
        has_ctrl139 => 35, 5;
        has_ctrl140 => 35, 7;
        // query 36
        has_ctrl141 => 36, 0;
        has_ctrl142 => 36, 1;
        has_query37 => 36, 2;
        has_ctrl143 => 36, 3;
        has_ctrl144 => 36, 4;
        has_ctrl145 => 36, 5;
        has_ctrl146 => 36, 6;
        has_query38 => 36, 7;
        // query 38
        has_ctrl147 => 38, 0;
        has_ctrl148 => 38, 1;
        has_ctrl149 => 38, 2;
        has_ctrl150 => 38, 3;
        has_ctrl151 => 38, 4;
        has_ctrl152 => 38, 5;
        has_ctrl153 => 38, 6;
        has_query39 => 38, 7;
        // query 39
        has_ctrl154 => 39, 0;
        has_ctrl155 => 39, 1;
        has_ctrl156 => 39, 2;
        has_ctrl160 => 39, 3;
        has_ctrl157_ctrl158 => 39, 4;
        has_query40 => 39, 7;
        // query 40
        has_ctrl169 => 40, 0;
        has_ctrl163_query41 => 40, 1;
        has_ctrl165_query42 => 40, 3;
        has_ctrl166 => 40, 4;
        has_ctrl167 => 40, 5;
        has_ctrl168 => 40, 6;
        has_query43 => 40, 7;
        // query 43
        has_ctrl171 => 43, 2;
        has_ctrl172_query44_query45 => 43, 3;
        has_ctrl173 => 43, 4;
        has_ctrl174 => 43, 5;
        has_ctrl175 => 43, 6;
        has_query46 => 43, 7;
        // query 46
        has_ctrl176 => 46, 0;
        has_ctrl177_ctrl178 => 46, 1;
        has_ctrl179 => 46, 2;
        has_query47 => 46, 7;
        // query 47
        has_ctrl182 => 47, 1;
        has_ctrl183 => 47, 2;
        has_ctrl185 => 47, 4;
        has_ctrl186 => 47, 5;
        has_ctrl187 => 47, 6;
        has_query49 => 47, 7;
        // query 49
        has_ctrl188 => 49, 2;
        has_query50 => 49, 7;
        // query 50
        has_query51 => 50, 7;
        // query 51
        has_query53_query54_ctrl198 => 51, 5;
        has_query55 => 51, 7;
        // query 55
        has_query56 => 55, 0;
        has_query57 => 55, 7;
        // query 57
        has_query58 => 57, 7;
        // query 58
        has_query59 => 58, 0;
        has_query60 => 58, 1;
        has_query61 => 58, 7;
        // query 61
        has_ctrl215_query62_query63 => 61, 1;
        has_query64 => 61, 7;
        // query 64
        has_query65 => 64, 7;
        // query 65
        has_query66_ctrl231 => 65, 6;
        has_query68 => 65, 7;
        // query 68
        is_tddi_hic => 68, 6;
    }

    /// Firmware skips CBC/CDM preparation on its own
    pub fn skip_preparation(&self) -> bool {
        self.has_ctrl103_query26()
    }
}

macro_rules! q {
    ($n:expr, $present:expr) => {
        QueryField {
            number: $n,
            present: $present,
            size: |_| 1,
        }
    };
    ($n:expr, $present:expr, $size:expr) => {
        QueryField {
            number: $n,
            present: $present,
            size: |_| $size,
        }
    };
}

/// Optional queries 13..68 in register order
pub const QUERY_CHAIN: &[QueryField<F54Query>] = &[
    q!(13, |q| q.has_query13()),
    q!(14, |q| q.has_ctrl87()),
    q!(15, |q| q.has_query15()),
    q!(16, |q| q.has_query16()),
    q!(17, |q| q.has_query17()),
    q!(18, |q| q.has_ctrl94_query18()),
    q!(19, |q| q.has_ctrl95_query19()),
    q!(20, |q| q.has_query20()),
    q!(21, |q| q.has_query21()),
    q!(22, |q| q.has_query22()),
    q!(23, |q| q.has_query23()),
    q!(24, |q| q.has_query24_data18()),
    q!(25, |q| q.has_query25()),
    q!(26, |q| q.has_ctrl103_query26()),
    q!(27, |q| q.has_query27()),
    q!(28, |q| q.has_query28()),
    q!(29, |q| q.has_query29()),
    q!(30, |q| q.has_query30()),
    q!(31, |q| q.has_ctrl122_query31()),
    q!(32, |q| q.has_query32()),
    q!(33, |q| q.has_query33()),
    q!(34, |q| q.has_query34()),
    q!(35, |q| q.has_query35()),
    q!(36, |q| q.has_query36()),
    q!(37, |q| q.has_query37()),
    q!(38, |q| q.has_query38()),
    q!(39, |q| q.has_query39()),
    q!(40, |q| q.has_query40()),
    q!(41, |q| q.has_ctrl163_query41()),
    q!(42, |q| q.has_ctrl165_query42()),
    q!(43, |q| q.has_query43()),
    q!(44, |q| q.has_ctrl172_query44_query45(), 2),
    q!(46, |q| q.has_query46()),
    q!(47, |q| q.has_query47()),
    q!(49, |q| q.has_query49()),
    q!(50, |q| q.has_query50()),
    q!(51, |q| q.has_query51()),
    q!(53, |q| q.has_query53_query54_ctrl198(), 2),
    q!(55, |q| q.has_query55()),
    q!(56, |q| q.has_query56()),
    q!(57, |q| q.has_query57()),
    q!(58, |q| q.has_query58()),
    q!(59, |q| q.has_query59()),
    q!(60, |q| q.has_query60()),
    q!(61, |q| q.has_query61()),
    q!(62, |q| q.has_ctrl215_query62_query63(), 2),
    q!(64, |q| q.has_query64()),
    q!(65, |q| q.has_query65()),
    q!(66, |q| q.has_query66_ctrl231()),
    q!(68, |q| q.has_query68()),
];

macro_rules! c {
    ($n:expr, $present:expr) => {
        RegisterField {
            number: $n,
            present: $present,
            size: |_| 1,
        }
    };
    ($n:expr, $present:expr, $size:expr) => {
        RegisterField {
            number: $n,
            present: $present,
            size: $size,
        }
    };
}

/// Control registers 0..188 in register order
pub const CONTROL_TABLE: &[RegisterField<F54Query>] = &[
    c!(0, |_| true),
    c!(1, |q| q.family_0_or_1()),
    c!(2, |_| true, |_| 2),
    c!(3, |q| q.has_pixel_touch_threshold_adjustment()),
    // controls 4 5 6
    c!(4, |q| q.family_0_or_1(), |_| 5),
    c!(7, |q| q.touch_controller_family() == 1),
    // controls 8 9
    c!(8, |q| q.family_0_or_1(), |_| 3),
    c!(10, |q| q.has_interference_metric()),
    c!(11, |q| q.has_ctrl11(), |_| 2),
    // controls 12 13
    c!(12, |q| q.has_relaxation_control(), |_| 2),
    c!(14, |q| q.has_sensor_assignment()),
    c!(15, |q| q.has_sensor_assignment(), |q| q.num_rx() as u16),
    c!(16, |q| q.has_sensor_assignment(), |q| q.num_tx() as u16),
    c!(17, |q| q.has_sense_frequency_control(), |q| q.num_sensing_frequencies() as u16),
    c!(18, |q| q.has_sense_frequency_control(), |q| q.num_sensing_frequencies() as u16),
    c!(19, |q| q.has_sense_frequency_control(), |q| q.num_sensing_frequencies() as u16),
    c!(20, |_| true),
    c!(21, |q| q.has_sense_frequency_control(), |_| 2),
    // controls 22 .. 26
    c!(22, |q| q.has_firmware_noise_mitigation(), |_| 7),
    c!(27, |q| q.has_iir_filter()),
    c!(28, |q| q.has_firmware_noise_mitigation(), |_| 2),
    c!(29, |q| q.has_cmn_removal()),
    c!(30, |q| q.has_cmn_maximum()),
    c!(31, |q| q.has_touch_hysteresis()),
    // controls 32 .. 35
    c!(32, |q| q.has_edge_compensation(), |_| 8),
    c!(36, |q| matches!(q.curve_compensation_mode(), 1 | 2), |q| {
        if q.curve_compensation_mode() == 1 {
            q.num_rx().max(q.num_tx()) as u16
        } else {
            q.num_rx() as u16
        }
    }),
    c!(37, |q| q.curve_compensation_mode() == 2, |q| q.num_tx() as u16),
    // controls 38 39 40
    c!(38, |q| q.has_per_frequency_noise_control(), |q| 3 * q.num_sensing_frequencies() as u16),
    c!(41, |q| q.has_signal_clarity()),
    c!(42, |q| q.has_variance_metric(), |_| 2),
    // controls 43 .. 54
    c!(43, |q| q.has_multi_metric_state_machine(), |_| 13),
    // controls 55 56
    c!(55, |q| q.has_0d_relaxation_control(), |_| 2),
    c!(57, |q| q.has_0d_acquisition_control()),
    c!(58, |q| q.has_0d_acquisition_control()),
    c!(59, |q| q.has_h_blank()),
    // controls 60 61 62
    c!(60, |q| q.any_blank(), |_| 3),
    c!(63, |q| q.any_blank() || q.has_slew_metric() || q.has_slew_option() || q.has_noise_mitigation2()),
    // controls 64 .. 67
    c!(64, |q| q.any_blank(), |q| if q.has_h_blank() { 7 } else { 1 }),
    // controls 68 .. 73
    c!(68, |q| q.any_blank(), |_| 8),
    c!(74, |q| q.has_slew_metric(), |_| 2),
    c!(75, |q| q.has_enhanced_stretch(), |q| q.num_sensing_frequencies() as u16),
    c!(76, |q| q.has_startup_fast_relaxation()),
    // controls 77 78
    c!(77, |q| q.has_esd_control(), |_| 2),
    // controls 79 .. 83
    c!(79, |q| q.has_noise_mitigation2(), |_| 5),
    // controls 84 85
    c!(84, |q| q.has_energy_ratio_relaxation(), |_| 2),
    c!(86, |q| q.has_query13() && q.has_ctrl86()),
    c!(87, |q| q.has_query13() && q.has_ctrl87()),
    c!(88, |q| q.has_ctrl88()),
    c!(89, |q| q.has_query13() && (q.has_cidim() || q.has_noise_mitigation_enhancement() || q.has_rail_im())),
    c!(90, |q| q.has_ctrl90()),
    c!(91, |q| q.has_ctrl91()),
    c!(92, |q| q.has_ctrl92()),
    c!(93, |q| q.has_ctrl93()),
    c!(94, |q| q.has_ctrl94_query18()),
    c!(95, |q| q.has_ctrl95_query19()),
    c!(96, |q| q.has_ctrl96()),
    c!(97, |q| q.has_ctrl97()),
    c!(98, |q| q.has_ctrl98()),
    c!(99, |q| q.has_ctrl99()),
    c!(100, |q| q.has_ctrl100()),
    c!(101, |q| q.has_ctrl101()),
    c!(102, |q| q.has_ctrl102()),
    c!(103, |q| q.has_ctrl103_query26()),
    c!(104, |q| q.has_ctrl104()),
    c!(105, |q| q.has_ctrl105()),
    c!(106, |q| q.has_ctrl106()),
    c!(107, |q| q.has_ctrl107()),
    c!(108, |q| q.has_ctrl108()),
    c!(109, |q| q.has_ctrl109()),
    c!(110, |q| q.has_ctrl110()),
    c!(111, |q| q.has_ctrl111()),
    c!(112, |q| q.has_ctrl112()),
    c!(113, |q| q.has_ctrl113()),
    c!(114, |q| q.has_ctrl114()),
    c!(115, |q| q.has_ctrl115()),
    c!(116, |q| q.has_ctrl116()),
    c!(117, |q| q.has_ctrl117()),
    c!(118, |q| q.has_ctrl118()),
    c!(119, |q| q.has_ctrl119()),
    c!(120, |q| q.has_ctrl120()),
    c!(121, |q| q.has_ctrl121()),
    c!(122, |q| q.has_ctrl122_query31()),
    c!(123, |q| q.has_ctrl123()),
    c!(124, |q| q.has_ctrl124()),
    c!(125, |q| q.has_ctrl125()),
    c!(126, |q| q.has_ctrl126()),
    c!(127, |q| q.has_ctrl127()),
    c!(128, |q| q.has_ctrl128()),
    c!(129, |q| q.has_ctrl129()),
    c!(130, |q| q.has_ctrl130()),
    c!(131, |q| q.has_ctrl131()),
    c!(132, |q| q.has_ctrl132()),
    c!(133, |q| q.has_ctrl133()),
    c!(134, |q| q.has_ctrl134()),
    c!(135, |q| q.has_ctrl135()),
    c!(136, |q| q.has_ctrl136()),
    c!(137, |q| q.has_ctrl137()),
    c!(138, |q| q.has_ctrl138()),
    c!(139, |q| q.has_ctrl139()),
    c!(140, |q| q.has_ctrl140()),
    c!(141, |q| q.has_ctrl141()),
    c!(142, |q| q.has_ctrl142()),
    c!(143, |q| q.has_ctrl143()),
    c!(144, |q| q.has_ctrl144()),
    c!(145, |q| q.has_ctrl145()),
    c!(146, |q| q.has_ctrl146()),
    c!(147, |q| q.has_ctrl147()),
    c!(148, |q| q.has_ctrl148()),
    c!(149, |q| q.has_ctrl149()),
    c!(150, |q| q.has_ctrl150()),
    c!(151, |q| q.has_ctrl151()),
    c!(152, |q| q.has_ctrl152()),
    c!(153, |q| q.has_ctrl153()),
    c!(154, |q| q.has_ctrl154()),
    c!(155, |q| q.has_ctrl155()),
    c!(156, |q| q.has_ctrl156()),
    // controls 157 158
    c!(157, |q| q.has_ctrl157_ctrl158(), |_| 2),
    c!(160, |q| q.has_ctrl160()),
    c!(163, |q| q.has_ctrl163_query41()),
    c!(165, |q| q.has_ctrl165_query42()),
    c!(166, |q| q.has_ctrl166()),
    c!(167, |q| q.has_ctrl167()),
    c!(168, |q| q.has_ctrl168()),
    c!(169, |q| q.has_ctrl169()),
    c!(171, |q| q.has_ctrl171()),
    c!(172, |q| q.has_ctrl172_query44_query45()),
    c!(173, |q| q.has_ctrl173()),
    c!(174, |q| q.has_ctrl174()),
    c!(175, |q| q.has_ctrl175()),
    c!(176, |q| q.has_ctrl176()),
    // controls 177 178
    c!(177, |q| q.has_ctrl177_ctrl178(), |_| 2),
    c!(179, |q| q.has_ctrl179()),
    c!(182, |q| q.has_ctrl182()),
    c!(183, |q| q.has_ctrl183()),
    c!(185, |q| q.has_ctrl185()),
    c!(186, |q| q.has_ctrl186()),
    c!(187, |q| q.has_ctrl187()),
    c!(188, |q| q.has_ctrl188()),
];

/// Parsed F54
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F54Info {
    pub fd: FunctionDescriptor,
    pub query: F54Query,
    pub controls: RegisterLayout,
}

impl F54Info {
    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        let mut query = F54Query::default();

        // queries 0..11 first; query 12 depends on query 6
        t.read_register(fd.query_base, &mut query.base[..BASE_QUERY_SIZE - 1])?;
        let mut offset = (BASE_QUERY_SIZE - 1) as u16;
        if query.has_sense_frequency_control() {
            query.base[BASE_QUERY_SIZE - 1] = t.read_byte(fd.query_base + offset)?;
            offset += 1;
        }

        let end = read_query_chain(t, fd.query_base, offset, &mut query, QUERY_CHAIN)?;
        let controls = RegisterLayout::build(fd.control_base, &query, CONTROL_TABLE);

        log::info!(
            "F54: {} rx / {} tx, family {}, {} sense frequencies, {} query bytes, controls end 0x{:04X}",
            query.num_rx(),
            query.num_tx(),
            query.touch_controller_family(),
            query.num_sensing_frequencies(),
            end,
            controls.end()
        );
        log::debug!(
            "F54: optional queries {:?}",
            query.chain.numbers().collect::<Vec<_>>()
        );

        Ok(Self {
            fd,
            query,
            controls,
        })
    }

    /// Address of control `n`
    pub fn control(&self, n: u16) -> Option<u16> {
        self.controls.address(n)
    }

    pub fn command_addr(&self) -> u16 {
        self.fd.command_base
    }

    /// Report type register (data 0)
    pub fn report_type_addr(&self) -> u16 {
        self.fd.data_base
    }

    /// FIFO index register (data 1-2)
    pub fn fifo_index_addr(&self) -> u16 {
        self.fd.data_base + 1
    }

    /// Report data register (data 3)
    pub fn report_data_addr(&self) -> u16 {
        self.fd.data_base + 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::DummyRegisters;

    fn fd() -> FunctionDescriptor {
        FunctionDescriptor {
            number: 0x54,
            query_base: 0x0100,
            command_base: 0x0200,
            control_base: 0x0300,
            data_base: 0x0400,
            version: 0,
            interrupt_count: 1,
            interrupt_offset: 0,
        }
    }

    #[test]
    fn test_minimal_query() {
        let mut regs = DummyRegisters::new();
        // 12 rx, 20 tx, family 0, nothing optional
        regs.load(0x0100, &[12, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let f54 = F54Info::parse(&mut regs, fd()).unwrap();
        assert_eq!(f54.query.num_rx(), 12);
        assert_eq!(f54.query.num_tx(), 20);
        assert_eq!(f54.query.num_sensing_frequencies(), 0);
        // family 0: controls 0, 1, 2 (2 bytes), 4-6 (5), 8-9 (3), 20
        assert_eq!(f54.control(0), Some(0x0300));
        assert_eq!(f54.control(2), Some(0x0302));
        assert_eq!(f54.control(4), Some(0x0304));
        assert_eq!(f54.control(7), None);
        assert_eq!(f54.control(8), Some(0x0309));
        assert_eq!(f54.control(20), Some(0x030C));
        assert_eq!(f54.control(88), None);
    }

    #[test]
    fn test_query12_gates_chain_offset() {
        let mut regs = DummyRegisters::new();
        // query 6: sense frequency control; query 11: has_query13
        let mut base = [0u8; 14];
        base[0] = 4;
        base[1] = 4;
        base[5] = 1; // family 1
        base[7] = 1 << 2;
        base[12] = 1 << 3;
        base[13] = 3; // 3 frequencies
        regs.load(0x0100, &base);
        // query 13: has_ctrl86
        regs.load(0x010E, &[0x01]);
        let f54 = F54Info::parse(&mut regs, fd()).unwrap();
        assert_eq!(f54.query.num_sensing_frequencies(), 3);
        assert_eq!(f54.query.chain.byte(13, 0), 0x01);
        assert!(f54.query.has_ctrl86());
        // family 1 has control 7
        assert!(f54.control(7).is_some());
        // 17, 18, 19 are 3 addresses each
        let c17 = f54.control(17).unwrap();
        assert_eq!(f54.control(18), Some(c17 + 3));
        assert_eq!(f54.control(19), Some(c17 + 6));
        assert!(f54.control(86).is_some());
    }

    #[test]
    fn test_without_sense_frequency_query13_moves_down() {
        let mut regs = DummyRegisters::new();
        let mut base = [0u8; 13];
        base[12] = 1 << 3; // has_query13
        regs.load(0x0100, &base);
        regs.load(0x010D, &[0x02]); // has_ctrl87 -> query 14 follows
        regs.load(0x010E, &[0x55]);
        let f54 = F54Info::parse(&mut regs, fd()).unwrap();
        assert!(f54.query.has_ctrl87());
        assert_eq!(f54.query.chain.byte(14, 0), 0x55);
    }

    #[test]
    fn test_deep_chain_reaches_ctrl149_and_ctrl188() {
        let mut regs = DummyRegisters::new();
        let mut base = [0u8; 13];
        base[12] = 1 << 7; // has_query15
        regs.load(0x0100, &base);
        // 15: query25; 25: query27; 27: query29; 29: query30; 30: query32;
        // 32: query33; 33: query36; 36: query38; 38: ctrl149 | query39;
        // 39: query40; 40: query43; 43: query46; 46: query47; 47: query49;
        // 49: ctrl188
        let chain = [
            0x80, 0x80, 0x80, 0x80, 0x80, 0x10, 0x80, 0x80, 0x84, 0x80, 0x80, 0x80, 0x80,
            0x80, 0x04,
        ];
        regs.load(0x010D, &chain);
        let f54 = F54Info::parse(&mut regs, fd()).unwrap();
        assert!(f54.query.has_ctrl149());
        assert!(f54.query.has_ctrl188());
        let c149 = f54.control(149).unwrap();
        let c188 = f54.control(188).unwrap();
        assert!(c188 > c149);
    }
}
