// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SDP service record for the RFCOMM listening socket.

use std::fmt::Write;

use super::service_uuid::ServiceUuid;

/// Public browse group root.
pub const PUBLIC_BROWSE_GROUP: u16 = 0x1002;

/// L2CAP protocol UUID.
pub const L2CAP_UUID: u16 = 0x0100;

/// RFCOMM protocol UUID.
pub const RFCOMM_UUID: u16 = 0x0003;

/// SDP attribute identifiers.
pub mod attr {
    pub const SERVICE_CLASS_ID_LIST: u16 = 0x0001;
    pub const SERVICE_ID: u16 = 0x0003;
    pub const PROTOCOL_DESCRIPTOR_LIST: u16 = 0x0004;
    pub const BROWSE_GROUP_LIST: u16 = 0x0005;
    pub const SERVICE_NAME: u16 = 0x0100;
    pub const SERVICE_DESCRIPTION: u16 = 0x0101;
    pub const PROVIDER_NAME: u16 = 0x0102;
}

/// Human-readable strings published with the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub provider: String,
    pub description: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "RFCOMM Server socket".to_string(),
            provider: "Service Provider".to_string(),
            description: "A RFCOMM listening socket".to_string(),
        }
    }
}

/// One layer of the protocol descriptor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLayer {
    /// 16-bit protocol UUID.
    pub protocol: u16,
    /// Channel parameter, present on the RFCOMM layer only.
    pub channel: Option<u8>,
}

/// Service record registered with the discovery daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service_id: ServiceUuid,
    pub browse_group: u16,
    pub protocols: Vec<ProtocolLayer>,
    pub info: ServiceInfo,
}

impl ServiceRecord {
    /// Record for an RFCOMM server: L2CAP wrapping RFCOMM on `channel`.
    pub fn rfcomm(service_id: ServiceUuid, channel: u8, info: ServiceInfo) -> Self {
        Self {
            service_id,
            browse_group: PUBLIC_BROWSE_GROUP,
            protocols: vec![
                ProtocolLayer {
                    protocol: L2CAP_UUID,
                    channel: None,
                },
                ProtocolLayer {
                    protocol: RFCOMM_UUID,
                    channel: Some(channel),
                },
            ],
            info,
        }
    }

    /// RFCOMM channel carried by the protocol descriptor list.
    pub fn channel(&self) -> Option<u8> {
        self.protocols
            .iter()
            .find(|layer| layer.protocol == RFCOMM_UUID)
            .and_then(|layer| layer.channel)
    }

    /// Render the record in BlueZ's XML service record format.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<record>\n");
        let service = uuid_element(&self.service_id);

        // Writing into a String cannot fail.
        let _ = writeln!(
            xml,
            "  <attribute id=\"0x{:04x}\">\n    <sequence>\n      {}\n    </sequence>\n  </attribute>",
            attr::SERVICE_CLASS_ID_LIST,
            service
        );
        let _ = writeln!(
            xml,
            "  <attribute id=\"0x{:04x}\">\n    {}\n  </attribute>",
            attr::SERVICE_ID,
            service
        );

        let _ = writeln!(
            xml,
            "  <attribute id=\"0x{:04x}\">\n    <sequence>",
            attr::PROTOCOL_DESCRIPTOR_LIST
        );
        for layer in &self.protocols {
            xml.push_str("      <sequence>\n");
            let _ = writeln!(xml, "        <uuid value=\"0x{:04x}\" />", layer.protocol);
            if let Some(channel) = layer.channel {
                let _ = writeln!(xml, "        <uint8 value=\"0x{:02x}\" />", channel);
            }
            xml.push_str("      </sequence>\n");
        }
        xml.push_str("    </sequence>\n  </attribute>\n");

        let _ = writeln!(
            xml,
            "  <attribute id=\"0x{:04x}\">\n    <sequence>\n      <uuid value=\"0x{:04x}\" />\n    </sequence>\n  </attribute>",
            attr::BROWSE_GROUP_LIST,
            self.browse_group
        );

        for (id, text) in [
            (attr::SERVICE_NAME, &self.info.name),
            (attr::SERVICE_DESCRIPTION, &self.info.description),
            (attr::PROVIDER_NAME, &self.info.provider),
        ] {
            let _ = writeln!(
                xml,
                "  <attribute id=\"0x{:04x}\">\n    <text value=\"{}\" />\n  </attribute>",
                id,
                escape(text)
            );
        }

        xml.push_str("</record>\n");
        xml
    }
}

fn uuid_element(uuid: &ServiceUuid) -> String {
    format!("<uuid value=\"{}\" />", uuid)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfcomm_layers() {
        let record = ServiceRecord::rfcomm(ServiceUuid::Uuid16(0x1101), 7, ServiceInfo::default());

        assert_eq!(record.browse_group, PUBLIC_BROWSE_GROUP);
        assert_eq!(record.protocols.len(), 2);
        assert_eq!(record.protocols[0].protocol, L2CAP_UUID);
        assert_eq!(record.protocols[0].channel, None);
        assert_eq!(record.protocols[1].protocol, RFCOMM_UUID);
        assert_eq!(record.channel(), Some(7));
    }

    #[test]
    fn test_xml_contents() {
        let record = ServiceRecord::rfcomm(ServiceUuid::Uuid16(0x1101), 3, ServiceInfo::default());
        let xml = record.to_xml();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<attribute id=\"0x0003\">"));
        assert!(xml.contains("<uuid value=\"0x1101\" />"));
        assert!(xml.contains("<uuid value=\"0x0100\" />"));
        assert!(xml.contains("<uuid value=\"0x0003\" />"));
        assert!(xml.contains("<uint8 value=\"0x03\" />"));
        assert!(xml.contains("<uuid value=\"0x1002\" />"));
        assert!(xml.contains("<text value=\"RFCOMM Server socket\" />"));
        assert!(xml.contains("<text value=\"Service Provider\" />"));
        assert!(xml.contains("<text value=\"A RFCOMM listening socket\" />"));
        assert!(xml.trim_end().ends_with("</record>"));
    }

    #[test]
    fn test_xml_full_uuid() {
        let uuid = ServiceUuid::parse("a1b2c3d4-e5f6-7890-abcd-ef1234567890").unwrap();
        let xml = ServiceRecord::rfcomm(uuid, 1, ServiceInfo::default()).to_xml();
        assert!(xml.contains("<uuid value=\"a1b2c3d4-e5f6-7890-abcd-ef1234567890\" />"));
    }

    #[test]
    fn test_xml_escapes_text() {
        let info = ServiceInfo {
            name: "Tom & \"Jerry\" <serial>".to_string(),
            ..ServiceInfo::default()
        };
        let xml = ServiceRecord::rfcomm(ServiceUuid::Uuid16(0x1101), 1, info).to_xml();
        assert!(xml.contains("Tom &amp; &quot;Jerry&quot; &lt;serial&gt;"));
    }
}
