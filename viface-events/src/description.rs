use crate::types::EventType;

/// The canonical, API-stable human-readable string for an event kind.
///
/// Reproduced byte-for-byte from the reference implementation's
/// description table, since clients may match on these strings.
pub fn description(kind: EventType) -> &'static str {
    use EventType::*;
    match kind {
        // API Errors
        InvalidNeoDevice => "The provided neodevice_t object was invalid.",
        RequiredParameterNull => "A required parameter was NULL.",
        BufferInsufficient => "The provided buffer was insufficient. No data was written.",
        OutputTruncated => {
            "The output was too large for the provided buffer and has been truncated."
        }
        ParameterOutOfRange => "A parameter was out of range.",
        DeviceCurrentlyOpen => "The device is currently open.",
        DeviceCurrentlyClosed => "The device is currently closed.",
        DeviceCurrentlyOnline => "The device is currently online.",
        DeviceCurrentlyOffline => "The device is currently offline.",
        DeviceCurrentlyPolling => "The device is currently polling for messages.",
        DeviceNotCurrentlyPolling => "The device is not currently polling for messages.",
        UnsupportedTXNetwork => "Message network is not a supported TX network.",
        MessageMaxLengthExceeded => "The message was too long.",
        ValueNotYetPresent => "The value is not yet present.",
        Timeout => "The timeout was reached.",

        // Device Errors
        PollingMessageOverflow => "Too many messages have been recieved for the polling message buffer, some have been lost!",
        NoSerialNumberFW12V => "Communication could not be established with the device. Perhaps it is not powered with 12 volts?",
        NoSerialNumberFW => "Communication could not be established with the device. Perhaps it is not powered?",
        NoSerialNumber12V => "Communication could not be established with the device. Perhaps it is not powered with 12 volts or requires a firmware update using Vehicle Spy.",
        NoSerialNumber => "Communication could not be established with the device. Perhaps it is not powered or requires a firmware update using Vehicle Spy.",
        IncorrectSerialNumber => "The device did not return the expected serial number!",
        SettingsReadError => "The device settings could not be read.",
        SettingsVersionError => "The settings version is incorrect, please update your firmware with neoVI Explorer.",
        SettingsLengthError => "The settings length is incorrect, please update your firmware with neoVI Explorer.",
        SettingsChecksumError => "The settings checksum is incorrect, attempting to set defaults may remedy this issue.",
        SettingsNotAvailable => "Settings are not available for this device.",
        SettingsReadOnly => "Settings are read-only for this device.",
        CANSettingsNotAvailable => "CAN settings are not available for this device.",
        CANFDSettingsNotAvailable => "CANFD settings are not available for this device.",
        LSFTCANSettingsNotAvailable => "LSFTCAN settings are not available for this device.",
        SWCANSettingsNotAvailable => "SWCAN settings are not available for this device.",
        BaudrateNotFound => "The baudrate was not found.",
        UnexpectedNetworkType => "The network type was not found.",
        DeviceFirmwareOutOfDate => "The device firmware is out of date. New API functionality may not be supported.",
        SettingsStructureMismatch => "Unexpected settings structure for this device.",
        SettingsStructureTruncated => "Settings structure is longer than the device supports and will be truncated.",
        NoDeviceResponse => "Expected a response from the device but none were found.",
        MessageFormattingError => "The message was not properly formed.",
        CANFDNotSupported => "This device does not support CANFD.",
        RTRNotSupported => "RTR is not supported with CANFD.",
        DeviceDisconnected => "The device was disconnected.",
        OnlineNotSupported => "This device does not support going online.",
        TerminationNotSupportedDevice => "This device does not support software selectable termination.",
        TerminationNotSupportedNetwork => "This network does not support software selectable termination on this device.",
        AnotherInTerminationGroupEnabled => "A mutually exclusive network already has termination enabled.",
        EthPhyRegisterControlNotAvailable => "Ethernet PHY register control is not available for this device.",
        DiskNotSupported => "This device does not support accessing the specified disk.",
        EOFReached => "The requested length exceeds the available data from this disk.",
        SettingsDefaultsUsed => "The device settings could not be loaded, the default settings have been applied.",
        AtomicOperationRetried => "An operation failed to be atomically completed, but will be retried.",
        AtomicOperationCompletedNonatomically => "An ideally-atomic operation was completed nonatomically.",

        // Transport Errors
        FailedToRead => "A read operation failed.",
        FailedToWrite => "A write operation failed.",
        DriverFailedToOpen => "The device driver encountered a low-level error while opening the device.",
        DriverFailedToClose => "The device driver encountered a low-level error while closing the device.",
        PacketChecksumError => "There was a checksum error while decoding a packet. The packet was dropped.",
        TransmitBufferFull => "The transmit buffer is full and the device is set to non-blocking.",
        DeviceInUse => "The device is currently in use by another program.",
        PCAPCouldNotStart => "The PCAP driver could not be started. Ethernet devices will not be found.",
        PCAPCouldNotFindDevices => "The PCAP driver failed to find devices. Ethernet devices will not be found.",
        PacketDecodingError => "There was an error decoding a packet from the device.",

        // Other Errors
        TooManyEvents => "Too many events have occurred. The list has been truncated.",
        Unknown => "An unknown internal error occurred.",
        InvalidError | Any => "An invalid internal error occurred.",
    }
}
