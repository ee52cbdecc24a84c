use std::io::BufRead;

/// Traffic counters summed over the interfaces listed in `/proc/<pid>/net/dev`.
///
/// The file describes the network namespace the process lives in, so processes
/// sharing a namespace report the same totals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkStat {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
}

impl std::ops::AddAssign for NetworkStat {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes += rhs.rx_bytes;
        self.tx_bytes += rhs.tx_bytes;
    }
}

const LOOPBACK_INTERFACE: &str = "lo";

/// Number of receive columns preceding the transmit columns.
const RX_COLUMNS: usize = 8;

/// Splits `"  eth0: 1 2 3 ..."` into the interface name and its value columns.
fn parse_interface_line(line: &str) -> Option<(&str, impl Iterator<Item = &str>)> {
    let (iface, data) = line.trim().split_once(':')?;
    Some((iface.trim(), data.split_whitespace()))
}

/// Extracts the byte counters from the 16 value columns of an interface line.
///
/// Returns `None` for lines with fewer than 9 columns. Unparsable values count as zero.
fn stats_from_fields<'a>(mut fields: impl Iterator<Item = &'a str>) -> Option<NetworkStat> {
    let rx_bytes = fields.next()?.parse().unwrap_or(0);
    let tx_bytes = fields.nth(RX_COLUMNS - 1)?.parse().unwrap_or(0);
    Some(NetworkStat { rx_bytes, tx_bytes })
}

impl NetworkStat {
    /// Parses a `net/dev` table, summing every interface except loopback.
    ///
    /// # Errors
    ///
    /// Returns an I/O error only if reading from `buf` fails; malformed interface
    /// lines are skipped.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = NetworkStat::default();
        let mut line = String::new();

        // Skip headers (first two lines)
        for _ in 0..2 {
            buf.read_line(&mut line)?;
            line.clear();
        }

        while buf.read_line(&mut line)? != 0 {
            if let Some((iface, fields)) = parse_interface_line(&line) {
                if iface != LOOPBACK_INTERFACE {
                    if let Some(s) = stats_from_fields(fields) {
                        stat += s;
                    }
                }
            }
            line.clear();
        }

        Ok(stat)
    }
}
