use log::debug;

use super::{config::Config, ConnectArgs};
use crate::{
    error::Error,
    port::{list_ports, PortInfo},
};

/// Pick the serial port to flash.
///
/// A port given on the command line takes precedence over the one in the
/// configuration file. With neither, the first enumerated port is used.
pub fn get_serial_port(args: &ConnectArgs, config: &Config) -> Result<String, Error> {
    if let Some(port) = &args.port {
        Ok(port.clone())
    } else if let Some(port) = &config.connection.serial {
        debug!("Using serial port from configuration: {port}");
        Ok(port.clone())
    } else {
        let port = first_port(&list_ports())?;
        println!("[*] Using first detected port: {port}");
        Ok(port)
    }
}

fn first_port(ports: &[PortInfo]) -> Result<String, Error> {
    ports
        .first()
        .map(|port| port.device.clone())
        .ok_or(Error::NoSerial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::Connection;

    #[test]
    fn command_line_port_wins() {
        let args = ConnectArgs {
            port: Some("COM7".into()),
        };
        let config = Config {
            connection: Connection {
                serial: Some("/dev/ttyUSB0".into()),
            },
            ..Default::default()
        };

        assert_eq!(get_serial_port(&args, &config).unwrap(), "COM7");
    }

    #[test]
    fn configured_port_is_used() {
        let args = ConnectArgs { port: None };
        let config = Config {
            connection: Connection {
                serial: Some("/dev/ttyUSB0".into()),
            },
            ..Default::default()
        };

        assert_eq!(get_serial_port(&args, &config).unwrap(), "/dev/ttyUSB0");
    }

    #[test]
    fn first_enumerated_port() {
        let ports = vec![
            PortInfo::new("/dev/ttyUSB1", "n/a"),
            PortInfo::new("/dev/ttyUSB0", "n/a"),
        ];

        assert_eq!(first_port(&ports).unwrap(), "/dev/ttyUSB1");
        assert!(matches!(first_port(&[]), Err(Error::NoSerial)));
    }
}
