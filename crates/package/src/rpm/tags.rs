//! Header tag numbers and flag bits, as assigned by rpm.

pub const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
pub const LEAD_SIZE: usize = 96;
pub const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];
/// Lead `type` field value for source packages.
pub const LEAD_TYPE_SOURCE: u16 = 1;

pub const NAME: u32 = 1000;
pub const VERSION: u32 = 1001;
pub const RELEASE: u32 = 1002;
pub const EPOCH: u32 = 1003;
pub const SUMMARY: u32 = 1004;
pub const DESCRIPTION: u32 = 1005;
pub const BUILDTIME: u32 = 1006;
pub const BUILDHOST: u32 = 1007;
pub const SIZE: u32 = 1009;
pub const VENDOR: u32 = 1011;
pub const LICENSE: u32 = 1014;
pub const PACKAGER: u32 = 1015;
pub const GROUP: u32 = 1016;
pub const URL: u32 = 1020;
pub const ARCH: u32 = 1022;
pub const OLDFILENAMES: u32 = 1027;
pub const FILEMODES: u32 = 1030;
pub const FILEFLAGS: u32 = 1037;
pub const SOURCERPM: u32 = 1044;
pub const ARCHIVESIZE: u32 = 1046;
pub const PROVIDENAME: u32 = 1047;
pub const REQUIREFLAGS: u32 = 1048;
pub const REQUIRENAME: u32 = 1049;
pub const REQUIREVERSION: u32 = 1050;
pub const CONFLICTFLAGS: u32 = 1053;
pub const CONFLICTNAME: u32 = 1054;
pub const CONFLICTVERSION: u32 = 1055;
pub const CHANGELOGTIME: u32 = 1080;
pub const CHANGELOGNAME: u32 = 1081;
pub const CHANGELOGTEXT: u32 = 1082;
pub const OBSOLETENAME: u32 = 1090;
pub const SOURCEPACKAGE: u32 = 1106;
pub const PROVIDEFLAGS: u32 = 1112;
pub const PROVIDEVERSION: u32 = 1113;
pub const OBSOLETEFLAGS: u32 = 1114;
pub const OBSOLETEVERSION: u32 = 1115;
pub const DIRINDEXES: u32 = 1116;
pub const BASENAMES: u32 = 1117;
pub const DIRNAMES: u32 = 1118;
pub const LONGSIZE: u32 = 5009;

/// Uncompressed payload size, in the signature header.
pub const SIG_PAYLOADSIZE: u32 = 1007;

pub const TYPE_CHAR: u32 = 1;
pub const TYPE_INT8: u32 = 2;
pub const TYPE_INT16: u32 = 3;
pub const TYPE_INT32: u32 = 4;
pub const TYPE_INT64: u32 = 5;
pub const TYPE_STRING: u32 = 6;
pub const TYPE_BIN: u32 = 7;
pub const TYPE_STRING_ARRAY: u32 = 8;
pub const TYPE_I18NSTRING: u32 = 9;

pub const SENSE_LESS: u32 = 1 << 1;
pub const SENSE_GREATER: u32 = 1 << 2;
pub const SENSE_EQUAL: u32 = 1 << 3;
pub const SENSE_PREREQ: u32 = 1 << 6;
pub const SENSE_SCRIPT_PRE: u32 = 1 << 9;
pub const SENSE_SCRIPT_POST: u32 = 1 << 10;

pub const FILE_GHOST: u32 = 1 << 6;
pub const MODE_TYPE_MASK: u32 = 0o170000;
pub const MODE_DIR: u32 = 0o040000;
